use anyhow::Result;
use colored::{Color, Colorize};
use flowgraph_core::{BlockKind, SpecialKind};
use std::io::Write;

pub type EmitResult = Result<()>;

const INDENT: &str = "    ";

/// Indentation and color state threaded through one render.
#[derive(Debug, Clone, Default)]
pub struct EmitContext {
    pub depth: usize,
    pub use_colors: bool,
}

impl EmitContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn prefix(&self) -> String {
        INDENT.repeat(self.depth)
    }
}

pub trait Emitter {
    type Item;

    fn emit<W: Write>(&self, item: &Self::Item, writer: &mut W, context: &mut EmitContext) -> EmitResult;

    /// Fresh context for a top-level emit; emitters override this to carry their settings.
    fn new_context(&self) -> EmitContext {
        EmitContext::new()
    }

    fn emit_to_string(&self, item: &Self::Item) -> Result<String> {
        let mut out = Vec::new();
        self.emit(item, &mut out, &mut self.new_context())?;
        Ok(String::from_utf8(out)?)
    }
}

pub struct EmitHelper;

impl EmitHelper {
    pub fn write_line<W: Write>(out: &mut W, context: &EmitContext, text: &str) -> EmitResult {
        writeln!(out, "{}{}", context.prefix(), text)?;
        Ok(())
    }

    /// Writes `text` in `color` when the context allows colors, plain otherwise.
    pub fn write_tinted<W: Write>(out: &mut W, context: &EmitContext, text: &str, color: Color) -> EmitResult {
        if !context.use_colors {
            return Self::write_line(out, context, text);
        }
        writeln!(out, "{}{}", context.prefix(), text.color(color))?;
        Ok(())
    }

    pub fn write_comment<W: Write>(out: &mut W, context: &EmitContext, comment: &str) -> EmitResult {
        Self::write_tinted(out, context, &format!("// {}", comment), Color::Green)
    }

    pub fn write_section<W: Write>(out: &mut W, context: &EmitContext, title: &str) -> EmitResult {
        Self::write_tinted(out, context, &format!("=== {} ===", title), Color::Cyan)
    }

    /// `header {`, the indented body, then `}`.
    pub fn write_braced<W: Write>(
        out: &mut W,
        context: &mut EmitContext,
        header: &str,
        body: impl FnOnce(&mut W, &mut EmitContext) -> EmitResult,
    ) -> EmitResult {
        writeln!(out, "{}{} {{", context.prefix(), header)?;
        context.indent();
        body(out, context)?;
        context.dedent();
        writeln!(out, "{}}}", context.prefix())?;
        Ok(())
    }
}

pub fn block_kind_name(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::Special(SpecialKind::Entry) => "entry",
        BlockKind::Special(SpecialKind::RegularExit) => "regular exit",
        BlockKind::Special(SpecialKind::ExceptionalExit) => "exceptional exit",
        BlockKind::Regular => "regular",
        BlockKind::Conditional => "conditional",
        BlockKind::Exception => "exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> EmitResult) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_dedent_stops_at_zero() {
        let mut ctx = EmitContext::new();
        ctx.indent();
        ctx.indent();
        assert_eq!(ctx.prefix().len(), 8);
        for _ in 0..3 {
            ctx.dedent();
        }
        assert_eq!(ctx.depth, 0);
        assert!(ctx.prefix().is_empty());
    }

    #[test]
    fn test_comment_without_colors() {
        let ctx = EmitContext::new();
        let text = render(|out| EmitHelper::write_comment(out, &ctx, "method Worker.run"));
        assert_eq!(text, "// method Worker.run\n");
    }

    #[test]
    fn test_braced_body_is_indented() {
        let mut ctx = EmitContext::new();
        let text = render(|out| {
            EmitHelper::write_braced(out, &mut ctx, "digraph cfg", |w, c| EmitHelper::write_line(w, c, "block0;"))
        });
        assert_eq!(text, "digraph cfg {\n    block0;\n}\n");
        assert_eq!(ctx.depth, 0);
    }

    #[test]
    fn test_tinted_line_keeps_text() {
        colored::control::set_override(true);
        let ctx = EmitContext::new().with_colors(true);
        let text = render(|out| EmitHelper::write_tinted(out, &ctx, "block3", Color::Red));
        assert!(text.contains("block3"));
        assert!(text.contains("\u{1b}["));
    }

    #[test]
    fn test_block_kind_names() {
        assert_eq!(block_kind_name(BlockKind::Special(SpecialKind::Entry)), "entry");
        assert_eq!(block_kind_name(BlockKind::Special(SpecialKind::ExceptionalExit)), "exceptional exit");
        assert_eq!(block_kind_name(BlockKind::Conditional), "conditional");
    }
}
