//! Column layout templates
//!
//! A template names columns in display order, e.g.
//! `"git indent icon filename [modified readonly] size"`. Bare names
//! render with one space between any two columns that drew something.
//! A bracket group concatenates its members with no separator and
//! contributes nothing at all, separator included, unless at least one
//! member drew.
//!
//! Parsing and composing are split: [`Template::parse`] checks the
//! grammar, [`Template::compose`] resolves names against a registrar
//! and drops unavailable columns. The engine re-runs both whenever
//! settings change, which is how hot template edits take effect.

use crate::column::{Column, ColumnContext, ColumnRegistrar, DrawContext, DrawHandle};
use crate::error::{ViewError, ViewResult};
use crate::row::{AddOpts, RenderedRow, Row};
use arbor_core::node::Node;
use tracing::warn;

/// Default child-row layout
pub const DEFAULT_CHILD_TEMPLATE: &str =
    "git [selection clip] indent icon filename [modified readonly] link size";
/// Default child labeling layout
pub const DEFAULT_CHILD_LABELING_TEMPLATE: &str =
    "fullpath git modified readonly link size timeModified timeCreated timeAccessed";
/// Default root-row layout
pub const DEFAULT_ROOT_TEMPLATE: &str = "title root git hidden fullpath";
/// Default root labeling layout
pub const DEFAULT_ROOT_LABELING_TEMPLATE: &str = "root fullpath git hidden";

/// One template entry: a bare column or a tight group
#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateItem {
    Column(String),
    Group(Vec<String>),
}

/// Parsed column layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    items: Vec<TemplateItem>,
}

impl Template {
    /// Parses a layout string
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::TemplateParse`] for unbalanced or nested
    /// brackets and for an empty group.
    pub fn parse(text: &str) -> ViewResult<Template> {
        fn flush(
            name: &mut String,
            group: &mut Option<Vec<String>>,
            items: &mut Vec<TemplateItem>,
        ) {
            if name.is_empty() {
                return;
            }
            let finished = std::mem::take(name);
            match group {
                Some(members) => members.push(finished),
                None => items.push(TemplateItem::Column(finished)),
            }
        }

        let mut items = Vec::new();
        let mut group: Option<Vec<String>> = None;
        let mut name = String::new();

        for ch in text.chars() {
            match ch {
                '[' => {
                    if group.is_some() {
                        return Err(ViewError::TemplateParse(
                            "nested '[' is not supported".to_string(),
                        ));
                    }
                    flush(&mut name, &mut group, &mut items);
                    group = Some(Vec::new());
                }
                ']' => {
                    flush(&mut name, &mut group, &mut items);
                    match group.take() {
                        Some(members) if members.is_empty() => {
                            return Err(ViewError::TemplateParse("empty group".to_string()));
                        }
                        Some(members) => items.push(TemplateItem::Group(members)),
                        None => {
                            return Err(ViewError::TemplateParse(
                                "']' without matching '['".to_string(),
                            ));
                        }
                    }
                }
                c if c.is_whitespace() => flush(&mut name, &mut group, &mut items),
                c => name.push(c),
            }
        }
        flush(&mut name, &mut group, &mut items);
        if group.is_some() {
            return Err(ViewError::TemplateParse("unclosed '['".to_string()));
        }
        Ok(Template { items })
    }

    /// Every column name the template references, groups flattened
    pub fn column_names(&self) -> Vec<&str> {
        self.items
            .iter()
            .flat_map(|item| match item {
                TemplateItem::Column(name) => std::slice::from_ref(name),
                TemplateItem::Group(names) => names.as_slice(),
            })
            .map(String::as_str)
            .collect()
    }

    /// Resolves the template into a column pipeline
    ///
    /// Unavailable columns are dropped silently. A column whose `init`
    /// fails is logged and dropped, matching the treatment of any other
    /// configuration problem in a single column.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::UnknownColumn`] when a name is not
    /// registered for the context's node kind.
    pub async fn compose(
        &self,
        registrar: &ColumnRegistrar,
        ctx: &ColumnContext,
    ) -> ViewResult<Pipeline> {
        let mut entries = Vec::new();
        for item in &self.items {
            let names = match item {
                TemplateItem::Column(name) => std::slice::from_ref(name),
                TemplateItem::Group(names) => names.as_slice(),
            };
            let mut resolved = Vec::new();
            for name in names {
                let mut column = registrar.create(ctx.kind, name, ctx)?;
                if !column.available().await {
                    continue;
                }
                if let Err(error) = column.init().await {
                    warn!(column = name.as_str(), %error, "column init failed, dropping");
                    continue;
                }
                resolved.push(ResolvedColumn {
                    name: name.clone(),
                    column,
                });
            }
            if !resolved.is_empty() {
                entries.push(resolved);
            }
        }
        Ok(Pipeline { entries })
    }
}

#[derive(Debug)]
struct ResolvedColumn {
    name: String,
    column: Box<dyn Column>,
}

/// Composed columns in display order
///
/// Each entry is one separator unit: a bare column alone, or the
/// members of a bracket group together.
#[derive(Debug)]
pub struct Pipeline {
    entries: Vec<Vec<ResolvedColumn>>,
}

impl Pipeline {
    /// A pipeline that draws nothing, used when composing failed
    pub fn empty() -> Self {
        Pipeline {
            entries: Vec::new(),
        }
    }

    /// True when no columns survived composition
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves draw handles for one render pass over `nodes`
    pub async fn resolve(&self, nodes: &[Node]) -> PassHandles {
        let mut entries = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut handles = Vec::with_capacity(entry.len());
            for resolved in entry {
                handles.push(NamedHandle {
                    name: resolved.name.clone(),
                    handle: resolved.column.draw(nodes).await,
                });
            }
            entries.push(handles);
        }
        PassHandles { entries }
    }
}

struct NamedHandle {
    name: String,
    handle: DrawHandle,
}

/// Draw handles resolved for one pass
pub struct PassHandles {
    entries: Vec<Vec<NamedHandle>>,
}

impl PassHandles {
    /// Draws one tree row for a node
    pub fn draw_row(&self, node: &Node, index: usize, show_hidden: bool) -> RenderedRow {
        let ctx = DrawContext {
            node,
            index,
            labeling: false,
            show_hidden,
        };
        let mut row = Row::new();
        for entry in &self.entries {
            Self::draw_entry(&mut row, entry, &ctx);
        }
        row.finish()
    }

    /// One separator unit: rolls back the separator when nothing drew
    fn draw_entry(row: &mut Row, entry: &[NamedHandle], ctx: &DrawContext<'_>) {
        let checkpoint = row.checkpoint();
        if !row.is_empty() {
            row.add(" ", AddOpts::default());
        }
        let before = row.len();
        for named in entry {
            (named.handle.draw_node)(row, ctx);
        }
        if row.len() == before {
            row.truncate(checkpoint);
        }
    }

    /// Draws the labeling lines for a node, one line per column
    ///
    /// A column with no content for the node is skipped; `label_only`
    /// columns show just their name, everything else renders as
    /// `name: content`.
    pub fn label_rows(&self, node: &Node, index: usize, show_hidden: bool) -> Vec<RenderedRow> {
        let ctx = DrawContext {
            node,
            index,
            labeling: true,
            show_hidden,
        };
        let mut rows = Vec::new();
        for named in self.entries.iter().flatten() {
            if !named.handle.visible_for(node) {
                continue;
            }
            let mut probe = Row::new();
            (named.handle.draw_node)(&mut probe, &ctx);
            if probe.is_empty() {
                continue;
            }
            let mut row = Row::new();
            if named.handle.label_only {
                row.add(&named.name, AddOpts::hl("Label"));
            } else {
                row.add(&format!("{}: ", named.name), AddOpts::hl("Label"));
                (named.handle.draw_node)(&mut row, &ctx);
            }
            rows.push(row.finish());
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::{ClipRegister, SelectionSet};
    use arbor_core::node::NodeKind;
    use arbor_core::{BufferRegistry, CoreError, EventBus, Settings};
    use arbor_git::GitStatusCache;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn context() -> ColumnContext {
        let bus = EventBus::default();
        ColumnContext {
            settings: Arc::new(Settings::empty()),
            git: Arc::new(GitStatusCache::new(bus.clone())),
            buffers: Arc::new(BufferRegistry::new(bus)),
            clip: Arc::new(ClipRegister::new()),
            selection: Arc::new(SelectionSet::new()),
            kind: NodeKind::Child,
        }
    }

    struct StaticColumn {
        text: &'static str,
        mark: Option<&'static str>,
        label_only: bool,
    }

    impl StaticColumn {
        fn text(text: &'static str) -> Self {
            StaticColumn {
                text,
                mark: None,
                label_only: false,
            }
        }
    }

    #[async_trait]
    impl Column for StaticColumn {
        async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
            let text = self.text;
            let mark = self.mark;
            let handle = DrawHandle::new(move |row, _ctx| {
                let opts = match mark {
                    Some(category) => AddOpts::hl_mark("String", category),
                    None => AddOpts::hl("String"),
                };
                row.add(text, opts);
            });
            if self.label_only {
                handle.with_label_only()
            } else {
                handle
            }
        }
    }

    struct UnavailableColumn;

    #[async_trait]
    impl Column for UnavailableColumn {
        async fn available(&self) -> bool {
            false
        }

        async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
            DrawHandle::new(|_row, _ctx| {})
        }
    }

    struct BrokenColumn;

    #[async_trait]
    impl Column for BrokenColumn {
        async fn init(&mut self) -> ViewResult<()> {
            Err(CoreError::InvalidSetting {
                key: "broken.option".to_string(),
                message: "bad value".to_string(),
            }
            .into())
        }

        async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
            DrawHandle::new(|_row, _ctx| {})
        }
    }

    fn registrar() -> ColumnRegistrar {
        let mut registrar = ColumnRegistrar::new();
        registrar.register(NodeKind::Child, "a", |_| Box::new(StaticColumn::text("A")));
        registrar.register(NodeKind::Child, "b", |_| Box::new(StaticColumn::text("B")));
        registrar.register(NodeKind::Child, "nothing", |_| Box::new(StaticColumn::text("")));
        registrar.register(NodeKind::Child, "marked", |_| {
            Box::new(StaticColumn {
                text: "MK",
                mark: Some("probe"),
                label_only: false,
            })
        });
        registrar.register(NodeKind::Child, "tag", |_| {
            Box::new(StaticColumn {
                text: "on",
                mark: None,
                label_only: true,
            })
        });
        registrar.register(NodeKind::Child, "gone", |_| Box::new(UnavailableColumn));
        registrar.register(NodeKind::Child, "broken", |_| Box::new(BrokenColumn));
        registrar
    }

    fn node() -> Node {
        Node::new("demo", PathBuf::from("/r/demo"), 1)
    }

    async fn render(template: &str) -> RenderedRow {
        let pipeline = Template::parse(template)
            .unwrap()
            .compose(&registrar(), &context())
            .await
            .unwrap();
        let target = node();
        let handles = pipeline.resolve(std::slice::from_ref(&target)).await;
        handles.draw_row(&target, 0, false)
    }

    #[test]
    fn test_parse_bare_names() {
        let template = Template::parse("indent icon  filename").unwrap();
        assert_eq!(template.column_names(), vec!["indent", "icon", "filename"]);
    }

    #[test]
    fn test_parse_groups() {
        let template = Template::parse("a [b c] d").unwrap();
        assert_eq!(
            template.items,
            vec![
                TemplateItem::Column("a".to_string()),
                TemplateItem::Group(vec!["b".to_string(), "c".to_string()]),
                TemplateItem::Column("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_group_without_spaces() {
        let template = Template::parse("[a b]c").unwrap();
        assert_eq!(
            template.items,
            vec![
                TemplateItem::Group(vec!["a".to_string(), "b".to_string()]),
                TemplateItem::Column("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["[a [b]]", "[a", "a]", "[]", "[ ]"] {
            assert!(
                matches!(Template::parse(bad), Err(ViewError::TemplateParse(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_empty_template() {
        let template = Template::parse("").unwrap();
        assert!(template.column_names().is_empty());
    }

    #[test]
    fn test_default_templates_parse() {
        for text in [
            DEFAULT_CHILD_TEMPLATE,
            DEFAULT_CHILD_LABELING_TEMPLATE,
            DEFAULT_ROOT_TEMPLATE,
            DEFAULT_ROOT_LABELING_TEMPLATE,
        ] {
            assert!(Template::parse(text).is_ok(), "failed to parse {text:?}");
        }
    }

    #[tokio::test]
    async fn test_compose_unknown_column_is_error() {
        let template = Template::parse("a missing").unwrap();
        let err = template
            .compose(&registrar(), &context())
            .await
            .unwrap_err();
        assert!(matches!(err, ViewError::UnknownColumn { .. }));
    }

    #[tokio::test]
    async fn test_compose_skips_unavailable_and_broken() {
        let template = Template::parse("a gone broken b").unwrap();
        let pipeline = template.compose(&registrar(), &context()).await.unwrap();
        let target = node();
        let handles = pipeline.resolve(std::slice::from_ref(&target)).await;
        assert_eq!(handles.draw_row(&target, 0, false).text, "A B");
    }

    #[tokio::test]
    async fn test_single_space_between_drawing_columns() {
        assert_eq!(render("a b").await.text, "A B");
    }

    #[tokio::test]
    async fn test_empty_column_leaves_no_gap() {
        assert_eq!(render("a nothing b").await.text, "A B");
        assert_eq!(render("nothing a b").await.text, "A B");
        assert_eq!(render("a b nothing").await.text, "A B");
    }

    #[tokio::test]
    async fn test_group_members_concatenate_tightly() {
        assert_eq!(render("a [b marked]").await.text, "A BMK");
    }

    #[tokio::test]
    async fn test_empty_group_contributes_nothing() {
        assert_eq!(render("a [nothing nothing] b").await.text, "A B");
    }

    #[tokio::test]
    async fn test_mark_ranges_account_for_separators() {
        let row = render("a marked b").await;
        assert_eq!(row.text, "A MK B");
        assert_eq!(row.marks.len(), 1);
        let mark = &row.marks[0];
        assert_eq!(mark.category, "probe");
        assert_eq!(&row.text[mark.start..mark.end], "MK");
    }

    #[tokio::test]
    async fn test_label_rows() {
        let pipeline = Template::parse("a tag nothing")
            .unwrap()
            .compose(&registrar(), &context())
            .await
            .unwrap();
        let target = node();
        let handles = pipeline.resolve(std::slice::from_ref(&target)).await;
        let rows = handles.label_rows(&target, 0, false);

        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a: A", "tag"]);
        assert_eq!(rows[0].highlights[0].group, "Label");
    }

    #[tokio::test]
    async fn test_label_rows_respect_visibility() {
        struct GatedColumn;

        #[async_trait]
        impl Column for GatedColumn {
            async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
                DrawHandle::new(|row, _ctx| row.add("X", AddOpts::default()))
                    .with_label_visible(|node| node.directory)
            }
        }

        let mut registrar = ColumnRegistrar::new();
        registrar.register(NodeKind::Child, "gated", |_| Box::new(GatedColumn));
        let pipeline = Template::parse("gated")
            .unwrap()
            .compose(&registrar, &context())
            .await
            .unwrap();

        let plain = node();
        let handles = pipeline.resolve(std::slice::from_ref(&plain)).await;
        assert!(handles.label_rows(&plain, 0, false).is_empty());

        let mut directory = node();
        directory.directory = true;
        assert_eq!(handles.label_rows(&directory, 0, false).len(), 1);
    }

    #[tokio::test]
    async fn test_empty_pipeline_draws_blank() {
        let pipeline = Pipeline::empty();
        assert!(pipeline.is_empty());
        let target = node();
        let handles = pipeline.resolve(std::slice::from_ref(&target)).await;
        assert_eq!(handles.draw_row(&target, 0, false).text, "");
    }
}
