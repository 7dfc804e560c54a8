use pulldown_cmark::{Options, Parser, html};

/// Turns rendered markdown into rich text for `markdown` outputs.
pub trait RichTextConverter {
    fn convert(&self, markdown: &str) -> String;
}

/// CommonMark to HTML, with tables and strikethrough enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMarkConverter;

impl RichTextConverter for CommonMarkConverter {
    fn convert(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        let parser = Parser::new_ext(markdown, options);
        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, parser);
        output
    }
}
