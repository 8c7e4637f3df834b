//! PDF export of an expense list.
//!
//! Rendering is split in two steps: [`layout`] places text on fixed page
//! geometry and [`render_pdf`] serializes the resulting pages. Both are pure.

use crate::aggregate;
use crate::structs::Expense;

pub const REPORT_FILE_NAME: &str = "Expense_Report.pdf";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub left: f32,
    pub category_x: f32,
    pub amount_x: f32,
    pub title_offset: f32,
    pub title_gap: f32,
    pub continuation_offset: f32,
    pub row_pitch: f32,
    pub bottom_margin: f32,
    pub total_gap: f32,
    pub total_floor: f32,
}

impl PageGeometry {
    /// A4 portrait in points.
    pub const A4: PageGeometry = PageGeometry {
        width: 595.2756,
        height: 841.8898,
        left: 40.0,
        category_x: 150.0,
        amount_x: 300.0,
        title_offset: 40.0,
        title_gap: 30.0,
        continuation_offset: 50.0,
        row_pitch: 15.0,
        bottom_margin: 50.0,
        total_gap: 20.0,
        total_floor: 30.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub font: Font,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<TextItem>,
}

impl Page {
    fn text(&mut self, x: f32, y: f32, size: f32, font: Font, text: impl Into<String>) {
        self.items.push(TextItem {
            x,
            y,
            size,
            font,
            text: text.into(),
        });
    }
}

pub fn title_for(month: Option<&str>) -> String {
    format!("Expense Report - {}", month.unwrap_or("All Data"))
}

pub fn layout(
    title: &str,
    expenses: &[Expense],
    currency_symbol: &str,
    geometry: &PageGeometry,
) -> Vec<Page> {
    let g = geometry;
    let mut pages = Vec::new();
    let mut page = Page::default();
    let mut y = g.height - g.title_offset;

    page.text(g.left, y, 14.0, Font::Bold, title);
    y -= g.title_gap;

    for expense in expenses {
        if y < g.bottom_margin {
            pages.push(std::mem::take(&mut page));
            y = g.height - g.continuation_offset;
        }
        page.text(g.left, y, 10.0, Font::Regular, expense.date.as_str());
        page.text(g.category_x, y, 10.0, Font::Regular, expense.category.as_str());
        page.text(g.amount_x, y, 10.0, Font::Regular, format!("{:.2}", expense.amount));
        y -= g.row_pitch;
    }

    let mut total_y = y - g.total_gap;
    if total_y < g.total_floor {
        pages.push(std::mem::take(&mut page));
        total_y = g.height - g.continuation_offset;
    }
    let total = aggregate::total(expenses);
    page.text(g.left, total_y, 12.0, Font::Bold, format!("TOTAL = {} {:.2}", currency_symbol, total));
    pages.push(page);

    pages
}

/// Minimal PDF 1.4 writer using the base-14 Helvetica faces.
pub fn render_pdf(pages: &[Page], geometry: &PageGeometry) -> Vec<u8> {
    let mut pdf = PdfWriter::new();
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 5 + 2 * i).collect();
    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");

    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object(
        2,
        &format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()),
    );
    pdf.object(
        3,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );
    pdf.object(
        4,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
    );

    for (page, page_id) in pages.iter().zip(&page_ids) {
        let content_id = page_id + 1;
        pdf.object(
            *page_id,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.4} {:.4}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {content_id} 0 R >>",
                geometry.width, geometry.height
            ),
        );
        let stream = content_stream(page);
        pdf.object(
            content_id,
            &format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
        );
    }

    pdf.finish()
}

fn content_stream(page: &Page) -> String {
    page.items
        .iter()
        .map(|item| {
            format!(
                "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET",
                item.font.resource(),
                item.size,
                item.x,
                item.y,
                escape_text(&item.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escapes a string literal for WinAnsiEncoding; unmappable characters become `?`.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => out.push_str(&format!("\\{:03o}", c as u32)),
            _ => out.push('?'),
        }
    }
    out
}

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, id: usize, body: &str) {
        self.offsets.push((id, self.buf.len()));
        self.buf
            .extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    fn finish(mut self) -> Vec<u8> {
        self.offsets.sort_by_key(|(id, _)| *id);
        let size = self.offsets.len() + 1;
        let xref_at = self.buf.len();

        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for (_, offset) in &self.offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        ));
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<Expense> {
        (0..n)
            .map(|i| Expense {
                id: i as i64 + 1,
                user: "alice".into(),
                amount: 10.0,
                category: format!("cat{i}"),
                date: "2024-01-05".into(),
            })
            .collect()
    }

    fn texts(page: &Page) -> Vec<&str> {
        page.items.iter().map(|i| i.text.as_str()).collect()
    }

    #[test]
    fn single_page_report() {
        let expenses = vec![
            Expense { id: 1, user: "alice".into(), amount: 100.0, category: "food".into(), date: "2024-01-05".into() },
            Expense { id: 2, user: "alice".into(), amount: 50.25, category: "food".into(), date: "2024-01-20".into() },
        ];
        let pages = layout(&title_for(Some("2024-01")), &expenses, "Rs.", &PageGeometry::A4);

        assert_eq!(pages.len(), 1);
        let t = texts(&pages[0]);
        assert_eq!(t[0], "Expense Report - 2024-01");
        assert_eq!(&t[1..4], ["2024-01-05", "food", "100.00"]);
        assert_eq!(*t.last().unwrap(), "TOTAL = Rs. 150.25");

        let title = &pages[0].items[0];
        assert_eq!(title.font, Font::Bold);
        assert!((title.y - (841.8898 - 40.0)).abs() < 1e-3);
        let first_row = &pages[0].items[1];
        assert!((title.y - first_row.y - 30.0).abs() < 1e-3);
    }

    #[test]
    fn rows_overflow_onto_new_pages() {
        let pages = layout(&title_for(None), &rows(100), "Rs.", &PageGeometry::A4);
        assert_eq!(pages.len(), 3);

        // title + 49 rows of three cells
        assert_eq!(pages[0].items.len(), 1 + 49 * 3);
        assert_eq!(pages[1].items.len(), 50 * 3);
        assert_eq!(pages[2].items.len(), 3 + 1);

        let continuation = &pages[1].items[0];
        assert!((continuation.y - (841.8898 - 50.0)).abs() < 1e-3);
        assert!(pages.iter().flat_map(|p| &p.items).all(|i| i.y >= 15.0));
        assert_eq!(texts(&pages[2]).last().copied(), Some("TOTAL = Rs. 1000.00"));
    }

    #[test]
    fn empty_report_still_has_total() {
        let pages = layout(&title_for(None), &[], "Rs.", &PageGeometry::A4);
        assert_eq!(texts(&pages[0]), ["Expense Report - All Data", "TOTAL = Rs. 0.00"]);
    }

    #[test]
    fn pdf_structure_is_consistent() {
        let pages = layout(&title_for(None), &rows(60), "Rs.", &PageGeometry::A4);
        let bytes = render_pdf(&pages, &PageGeometry::A4);
        let text = String::from_utf8_lossy(&bytes);

        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("(Expense Report - All Data) Tj"));

        let start = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let offset: usize = text[start..].lines().next().unwrap().parse().unwrap();
        assert!(bytes[offset..].starts_with(b"xref"));

        let obj1 = bytes.windows(7).position(|w| w == b"1 0 obj").unwrap();
        assert!(text.contains(&format!("{obj1:010} 00000 n ")));
    }

    #[test]
    fn text_is_escaped_for_pdf() {
        assert_eq!(escape_text("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_text("café"), "caf\\351");
        assert_eq!(escape_text("₹ 5"), "? 5");
    }
}
