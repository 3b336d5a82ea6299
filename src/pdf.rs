use std::io::BufWriter;

use printpdf::*;

use crate::error::{FinwizzError, Result};
use crate::fmt::{money, percent, CURRENCY};
use crate::reports::{FinancialReport, NO_ANOMALIES, NO_RARELY_USED, NO_RECURRING};

// A4 dimensions (mm)
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 20.0;
const MARGIN_LEFT: f32 = 18.0;
const MARGIN_RIGHT: f32 = 18.0;
const ROW_H: f32 = 5.0;
const FONT_SIZE: f32 = 10.0;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 10.0;
const SECTION_SIZE: f32 = 12.0;
/// Characters per line for wrapped paragraphs at `FONT_SIZE`.
const PARAGRAPH_CHARS: usize = 95;
const DESC_CHARS: usize = 60;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.18
}

/// The built-in PDF fonts have no rupee glyph.
fn pdf_money(val: f64) -> String {
    money(val).replace(CURRENCY, "Rs. ")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Col {
    width: f32,
    align: Align,
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| FinwizzError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| FinwizzError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: MARGIN_TOP,
        })
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold {
            self.font_bold.clone()
        } else {
            self.font.clone()
        };
        let layer = self
            .doc
            .get_page(self.current_page)
            .get_layer(self.current_layer);
        layer.use_text(s, size, Mm(x), Mm(self.pdf_y()), &font);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self
            .doc
            .get_page(self.current_page)
            .get_layer(self.current_layer);
        layer.set_outline_thickness(0.5);
        let line = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        };
        layer.add_line(line);
    }

    fn header(&mut self, title: &str, subtitle: &str) {
        self.text(title, MARGIN_LEFT, TITLE_SIZE, true);
        self.y += 7.0;
        if !subtitle.is_empty() {
            self.text(subtitle, MARGIN_LEFT, SUBTITLE_SIZE, false);
            self.y += 5.0;
        }
        let ts = chrono::Local::now()
            .format("Generated %Y-%m-%d %H:%M")
            .to_string();
        self.text(&ts, MARGIN_LEFT, 8.0, false);
        self.y += 5.0;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 6.0;
    }

    fn section(&mut self, label: &str) {
        self.ensure_space(ROW_H * 3.0);
        self.y += 2.0;
        self.text(label, MARGIN_LEFT, SECTION_SIZE, true);
        self.y += ROW_H + 1.0;
    }

    fn paragraph(&mut self, body: &str) {
        for line in textwrap::wrap(body, PARAGRAPH_CHARS) {
            self.ensure_space(ROW_H);
            self.text(&line, MARGIN_LEFT, FONT_SIZE, false);
            self.y += ROW_H;
        }
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.ensure_space(ROW_H * 2.0);
        let mut x = MARGIN_LEFT;
        for (i, col) in cols.iter().enumerate() {
            if let Some(h) = headers.get(i) {
                match col.align {
                    Align::Left => self.text(h, x, FONT_SIZE, true),
                    Align::Right => {
                        let tw = approx_text_width(h, FONT_SIZE);
                        self.text(h, x + col.width - tw, FONT_SIZE, true);
                    }
                }
            }
            x += col.width;
        }
        self.y += ROW_H;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 2.0;
    }

    fn table_row(&mut self, cols: &[Col], values: &[&str], bold: bool) {
        self.ensure_space(ROW_H);
        let mut x = MARGIN_LEFT;
        for (i, col) in cols.iter().enumerate() {
            if let Some(v) = values.get(i) {
                match col.align {
                    Align::Left => self.text(v, x, FONT_SIZE, bold),
                    Align::Right => {
                        let tw = approx_text_width(v, FONT_SIZE);
                        self.text(v, x + col.width - tw, FONT_SIZE, bold);
                    }
                }
            }
            x += col.width;
        }
        self.y += ROW_H;
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| FinwizzError::Pdf(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| FinwizzError::Pdf(e.to_string()))
    }
}

pub fn render_report(report: &FinancialReport, user_id: &str) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Financial Report")?;
    pdf.header("Financial Report", &format!("User {user_id}"));

    pdf.section("Key Metrics");
    let kv = &[
        Col { width: 110.0, align: Align::Left },
        Col { width: 64.0, align: Align::Right },
    ];
    let debit = pdf_money(report.totals.debit);
    let credit = pdf_money(report.totals.credit);
    let net = pdf_money(report.totals.net());
    let count = report.transaction_count.to_string();
    let target = pdf_money(report.savings_target());
    pdf.table_row(kv, &["Total Transactions", &count], false);
    pdf.table_row(kv, &["Total Debit", &debit], false);
    pdf.table_row(kv, &["Total Credit", &credit], false);
    pdf.table_row(kv, &["Net Balance Change", &net], true);
    pdf.table_row(kv, &["Savings Target (20% of income)", &target], false);

    pdf.section("Financial Health");
    let ratio = format!("Spending vs income: {}", percent(report.spending_ratio()));
    pdf.paragraph(&ratio);
    pdf.paragraph(report.spending_verdict());
    pdf.paragraph(&report.savings_verdict());

    pdf.section("Rarely Used Subscriptions");
    let rarely = report.rarely_used();
    if rarely.is_empty() {
        pdf.paragraph(NO_RARELY_USED);
    } else {
        for g in rarely {
            let line = format!("{} (used {}x)", truncate(&g.label, DESC_CHARS), g.count);
            pdf.paragraph(&line);
        }
    }

    pdf.section("Summary");
    pdf.paragraph(&report.summary_paragraph());

    pdf.section("Top 5 Spending Categories");
    let cat_cols = &[
        Col { width: 110.0, align: Align::Left },
        Col { width: 40.0, align: Align::Right },
        Col { width: 24.0, align: Align::Right },
    ];
    pdf.table_header(cat_cols, &["Category", "Spent", "Count"]);
    for c in &report.top_categories {
        let amt = pdf_money(c.total);
        let cnt = c.count.to_string();
        pdf.table_row(cat_cols, &[&c.name, &amt, &cnt], false);
    }

    pdf.section("Monthly Earnings vs Expenses");
    let month_cols = &[
        Col { width: 74.0, align: Align::Left },
        Col { width: 50.0, align: Align::Right },
        Col { width: 50.0, align: Align::Right },
    ];
    pdf.table_header(month_cols, &["Month", "Income", "Expenses"]);
    for m in &report.months {
        let inc = pdf_money(m.income);
        let exp = pdf_money(m.expense);
        pdf.table_row(month_cols, &[&m.label, &inc, &exp], false);
    }

    pdf.section("Recurring Payments");
    if report.recurring.is_empty() {
        pdf.paragraph(NO_RECURRING);
    } else {
        let rec_cols = &[
            Col { width: 110.0, align: Align::Left },
            Col { width: 24.0, align: Align::Right },
            Col { width: 40.0, align: Align::Right },
        ];
        pdf.table_header(rec_cols, &["Payment", "Times", "Total"]);
        for g in &report.recurring {
            let label = truncate(&g.label, DESC_CHARS);
            let cnt = g.count.to_string();
            let total = pdf_money(g.total);
            pdf.table_row(rec_cols, &[&label, &cnt, &total], false);
        }
    }

    pdf.section("Anomalies");
    if report.anomalies.is_empty() {
        pdf.paragraph(NO_ANOMALIES);
    } else {
        let an_cols = &[
            Col { width: 28.0, align: Align::Left },
            Col { width: 106.0, align: Align::Left },
            Col { width: 40.0, align: Align::Right },
        ];
        pdf.table_header(an_cols, &["Date", "Description", "Amount"]);
        for t in &report.anomalies {
            let day = t.day_label();
            let desc = truncate(&t.description, DESC_CHARS);
            let amt = pdf_money(t.amount);
            pdf.table_row(an_cols, &[&day, &desc, &amt], false);
        }
    }

    pdf.to_bytes()
}
