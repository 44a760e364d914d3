//! Debit note documents: the HTML preview and the generated PDF.

use crate::config::DocumentSettings;
use crate::error::AppError;
use crate::models::{format_date, BalanceView, HistoryRow, InstallmentRow};
use crate::scope::RequestScope;
use crate::services::debit_notes::DebitNoteDraft;
use crate::services::metrics::record_document;
use askama::Template;
use billing_core::models::{BankDetails, Customer, PaymentHistoryEntry};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

#[derive(Debug, Clone)]
pub struct CompanyHeader {
    pub name: String,
    pub address: String,
    pub gstin: Option<String>,
}

impl From<&DocumentSettings> for CompanyHeader {
    fn from(settings: &DocumentSettings) -> Self {
        Self {
            name: settings.company_name.clone(),
            address: settings.company_address.clone(),
            gstin: settings.company_gstin.clone(),
        }
    }
}

/// Everything printed on a debit note, already formatted.
#[derive(Debug, Clone)]
pub struct DebitNoteDocument {
    pub company: CompanyHeader,
    pub number: String,
    pub date: String,
    pub due_date: String,
    pub credit_bill_number: String,
    pub credit_bill_date: String,
    pub customer_name: String,
    pub customer_address: String,
    pub customer_gstin: String,
    pub installments: Vec<InstallmentRow>,
    pub history: Vec<HistoryRow>,
    pub balance: BalanceView,
    pub bank: Option<BankDetails>,
    pub is_draft: bool,
    pub cancelled: bool,
}

impl DebitNoteDocument {
    pub fn build(
        company: CompanyHeader,
        draft: &DebitNoteDraft,
        customer: Option<&Customer>,
        bank: Option<BankDetails>,
        history: &[PaymentHistoryEntry],
    ) -> Self {
        let note = &draft.note;
        let bill = &draft.credit_bill;

        let customer_name = customer
            .map(|c| c.name.clone())
            .or_else(|| bill.customer_name.clone())
            .unwrap_or_else(|| bill.customer_id.clone());

        Self {
            company,
            number: note.display_number().to_string(),
            date: format_date(note.date),
            due_date: format_date(note.due_date),
            credit_bill_number: bill.invoice_number.clone(),
            credit_bill_date: format_date(bill.date),
            customer_name,
            customer_address: customer.and_then(|c| c.address.clone()).unwrap_or_default(),
            customer_gstin: customer.and_then(|c| c.gstin.clone()).unwrap_or_default(),
            installments: InstallmentRow::rows(note.installments()),
            history: history.iter().map(HistoryRow::from).collect(),
            balance: note.balance().into(),
            bank,
            is_draft: !note.is_persisted(),
            cancelled: note.cancelled,
        }
    }

    pub fn filename(&self) -> String {
        let number: String = self
            .number
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("DebitNote-{}.pdf", number)
    }

    pub fn email_subject(&self) -> String {
        format!("Debit Note {} from {}", self.number, self.company.name)
    }

    pub fn email_body(&self, message: Option<&str>) -> String {
        let mut body = format!(
            "Dear {},\n\nPlease find attached debit note {} against credit bill {}.\n\
             Amount received: Rs. {}\nBalance due: Rs. {} (due {})\n",
            self.customer_name,
            self.number,
            self.credit_bill_number,
            self.balance.paid,
            self.balance.remaining,
            self.due_date
        );
        if let Some(message) = message.map(str::trim).filter(|m| !m.is_empty()) {
            body.push('\n');
            body.push_str(message);
            body.push('\n');
        }
        body.push_str(&format!("\nRegards,\n{}\n", self.company.name));
        body
    }
}

#[derive(Template)]
#[template(path = "documents/debit_note.html")]
pub struct DebitNoteHtml<'a> {
    pub doc: &'a DebitNoteDocument,
}

pub fn render_html(doc: &DebitNoteDocument) -> Result<String, AppError> {
    let html = DebitNoteHtml { doc }.render()?;
    record_document("html", "ok");
    Ok(html)
}

/// Generate the PDF off the async runtime, bounded by `limit` and by the
/// request's lifetime.
pub async fn render_pdf_scoped(
    scope: &RequestScope,
    doc: DebitNoteDocument,
    limit: std::time::Duration,
) -> Result<Vec<u8>, AppError> {
    let result = scope
        .run_with_timeout("PDF generation", limit, async move {
            tokio::task::spawn_blocking(move || render_pdf(&doc))
                .await
                .map_err(|e| AppError::Render(format!("PDF task failed: {}", e)))?
        })
        .await;

    record_document("pdf", if result.is_ok() { "ok" } else { "failed" });
    result
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 282.0;
const BOTTOM: f32 = 20.0;
const LEFT: f32 = 15.0;
const RIGHT: f32 = 195.0;

struct PageWriter<'a> {
    pdf: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PageWriter<'_> {
    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
        if self.y < BOTTOM {
            let (page, layer) = self.pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.pdf.get_page(page).get_layer(layer);
            self.y = TOP;
        }
    }

    fn rule(&mut self) {
        self.layer.add_line(printpdf::Line {
            points: vec![
                (printpdf::Point::new(Mm(LEFT), Mm(self.y)), false),
                (printpdf::Point::new(Mm(RIGHT), Mm(self.y)), false),
            ],
            is_closed: false,
        });
        self.advance(6.0);
    }

    fn row(&mut self, columns: &[(f32, &str)], bold: bool) {
        for (x, text) in columns {
            self.text(text, 9.0, *x, bold);
        }
        self.advance(5.5);
    }
}

pub fn render_pdf(doc: &DebitNoteDocument) -> Result<Vec<u8>, AppError> {
    let render_err = |e: printpdf::Error| AppError::Render(e.to_string());

    let (pdf, page1, layer1) = PdfDocument::new(
        format!("Debit Note {}", doc.number),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let regular = pdf.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?;
    let bold = pdf.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_err)?;

    let mut w = PageWriter {
        pdf: &pdf,
        layer: pdf.get_page(page1).get_layer(layer1),
        regular,
        bold,
        y: TOP,
    };

    // Header
    w.text(&doc.company.name, 16.0, LEFT, true);
    let title = if doc.cancelled { "DEBIT NOTE (CANCELLED)" } else { "DEBIT NOTE" };
    w.text(title, 16.0, 130.0, true);
    w.advance(7.0);
    if !doc.company.address.is_empty() {
        w.text(&doc.company.address, 9.0, LEFT, false);
    }
    w.text(&format!("No: {}", doc.number), 10.0, 130.0, true);
    w.advance(5.0);
    if let Some(gstin) = &doc.company.gstin {
        w.text(&format!("GSTIN: {}", gstin), 9.0, LEFT, false);
    }
    w.text(&format!("Date: {}", doc.date), 10.0, 130.0, false);
    w.advance(5.0);
    w.text(&format!("Due: {}", doc.due_date), 10.0, 130.0, false);
    w.advance(6.0);
    w.rule();

    // Parties
    w.text("Bill to", 10.0, LEFT, true);
    w.text(
        &format!("Against credit bill {} of {}", doc.credit_bill_number, doc.credit_bill_date),
        9.0,
        110.0,
        false,
    );
    w.advance(5.0);
    w.text(&doc.customer_name, 10.0, LEFT, false);
    w.advance(5.0);
    if !doc.customer_address.is_empty() {
        w.text(&doc.customer_address, 9.0, LEFT, false);
        w.advance(5.0);
    }
    if !doc.customer_gstin.is_empty() {
        w.text(&format!("GSTIN: {}", doc.customer_gstin), 9.0, LEFT, false);
        w.advance(5.0);
    }
    w.advance(3.0);
    w.rule();

    // Installments
    w.text("Installments", 11.0, LEFT, true);
    w.advance(6.0);
    w.row(&[(LEFT, "#"), (25.0, "Date"), (70.0, "Status"), (150.0, "Amount (Rs.)")], true);
    for row in &doc.installments {
        let index = (row.index + 1).to_string();
        w.row(
            &[(LEFT, index.as_str()), (25.0, row.date.as_str()), (70.0, row.status), (150.0, row.amount.as_str())],
            false,
        );
    }
    if doc.installments.is_empty() {
        w.row(&[(25.0, "No installments recorded")], false);
    }
    w.advance(2.0);
    w.rule();

    // Totals
    w.row(&[(110.0, "Opening balance"), (150.0, doc.balance.opening.as_str())], false);
    w.row(&[(110.0, "Total received"), (150.0, doc.balance.paid.as_str())], false);
    w.row(&[(110.0, "Balance due"), (150.0, doc.balance.remaining.as_str())], true);
    if let Some(overpaid) = &doc.balance.overpaid_by {
        w.row(&[(110.0, "Paid in excess"), (150.0, overpaid.as_str())], false);
    }
    w.advance(2.0);
    w.rule();

    // Payment history
    if !doc.history.is_empty() {
        w.text("Payment history", 11.0, LEFT, true);
        w.advance(6.0);
        w.row(
            &[(LEFT, "Date"), (40.0, "Document"), (75.0, "Type"), (115.0, "Paid"), (155.0, "Balance")],
            true,
        );
        for entry in &doc.history {
            let paid = if entry.pending {
                format!("{} *", entry.paid)
            } else {
                entry.paid.clone()
            };
            w.row(
                &[
                    (LEFT, entry.date.as_str()),
                    (40.0, entry.invoice_number.as_str()),
                    (75.0, entry.bill_type),
                    (115.0, paid.as_str()),
                    (155.0, entry.remaining.as_str()),
                ],
                false,
            );
        }
        if doc.history.iter().any(|e| e.pending) {
            w.text("* not yet saved", 8.0, LEFT, false);
            w.advance(5.0);
        }
        w.advance(2.0);
        w.rule();
    }

    // Bank
    if let Some(bank) = &doc.bank {
        w.text("Payment details", 11.0, LEFT, true);
        w.advance(6.0);
        w.row(&[(LEFT, "Bank"), (50.0, bank.bank_name.as_str())], false);
        if !bank.account_name.is_empty() {
            w.row(&[(LEFT, "Account name"), (50.0, bank.account_name.as_str())], false);
        }
        w.row(&[(LEFT, "Account number"), (50.0, bank.account_number.as_str())], false);
        w.row(&[(LEFT, "IFSC"), (50.0, bank.ifsc.as_str())], false);
        if let Some(branch) = &bank.branch {
            w.row(&[(LEFT, "Branch"), (50.0, branch.as_str())], false);
        }
    }

    if doc.is_draft {
        w.advance(4.0);
        w.text("DRAFT - not yet saved", 10.0, LEFT, true);
    }

    drop(w);
    let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
    pdf.save(&mut writer).map_err(render_err)?;
    writer
        .into_inner()
        .map_err(|e| AppError::Render(e.to_string()))
}
