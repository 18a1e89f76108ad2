use leaders_core::{clean_paragraph, NO_PARAGRAPH_SENTINEL};
use scraper::{ElementRef, Html, Selector};

pub trait BiographyExtractor: Send + Sync {
    /// Returns the cleaned introduction, or the sentinel when none is found.
    fn extract(&self, html: &str) -> String;
}

/// Encyclopedia pages bold the subject's name in the opening sentence, so the
/// first `<p>` holding a `<b>` is taken as the introduction. Only that
/// paragraph is considered: if its text is empty the result is the sentinel.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoldParagraphExtractor;

impl BiographyExtractor for BoldParagraphExtractor {
    fn extract(&self, html: &str) -> String {
        let doc = Html::parse_document(html);
        let (Ok(paragraph_sel), Ok(bold_sel)) = (Selector::parse("p"), Selector::parse("b"))
        else {
            return NO_PARAGRAPH_SENTINEL.to_string();
        };

        doc.select(&paragraph_sel)
            .find(|paragraph| paragraph.select(&bold_sel).next().is_some())
            .map(plain_text)
            .filter(|text| !text.is_empty())
            .map(|text| clean_paragraph(&text))
            .unwrap_or_else(|| NO_PARAGRAPH_SENTINEL.to_string())
    }
}

fn plain_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}
