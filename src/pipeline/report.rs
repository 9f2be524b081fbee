//! Report building: render the aggregated records into a master-detail
//! workbook.
//!
//! Two stages, so the row structure stays testable without cracking open an
//! xlsx file:
//!
//! 1. [`layout_rows`] — pure: records → ordered parent/child row plan.
//! 2. [`render_workbook`] — the plan → styled workbook bytes via
//!    rust_xlsxwriter.
//!
//! Layout rules: one styled header row; per invoice one bold, filled parent
//! row carrying every invoice-level field (invoice id written as literal
//! text so `"00042"` survives Excel), with the financial summary appearing
//! **only** there; then one indented child row per line item, grouped one
//! outline level below the parent and collapsed, so the default view shows
//! invoices with expandable detail.

use crate::error::InvoiceError;
use crate::record::{InvoiceRecord, LineItem};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, IgnoreError, Workbook, Worksheet,
};

/// The fixed 16-column report layout.
pub const HEADERS: [&str; 16] = [
    "Type",
    "Filename",
    "Invoice_ID",
    "Date",
    "Due Date",
    "Seller",
    "Buyer",
    "Bank Info",
    "Item Description",
    "Qty",
    "Unit Price",
    "Line Total",
    "Tax",
    "TOTAL PAYABLE",
    "Currency",
    "General Summary",
];

/// Placeholder shown in the parent row's item-description column.
const ITEMS_BELOW: &str = "— Invoice Items Below —";

/// Per-column widths: narrow for codes and dates, wide for names,
/// descriptions, and the summary.
const COLUMN_WIDTHS: [f64; 16] = [
    10.0, // Type
    25.0, // Filename
    15.0, // Invoice_ID
    15.0, // Date
    15.0, // Due Date
    25.0, // Seller
    25.0, // Buyer
    20.0, // Bank Info
    40.0, // Item Description
    12.0, // Qty
    12.0, // Unit Price
    12.0, // Line Total
    12.0, // Tax
    15.0, // TOTAL PAYABLE
    8.0,  // Currency
    30.0, // General Summary
];

/// One data row of the report (the header row is implicit).
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRow<'a> {
    /// Invoice summary row (`Type = "INVOICE"`).
    Parent(&'a InvoiceRecord),
    /// Line-item detail row (`Type = "Item"`), nested under its parent.
    Child(&'a LineItem),
}

/// Plan the report's data rows: each invoice's parent row immediately
/// followed by one child row per line item.
pub fn layout_rows(records: &[InvoiceRecord]) -> Vec<ReportRow<'_>> {
    let mut rows = Vec::new();
    for record in records {
        rows.push(ReportRow::Parent(record));
        rows.extend(record.line_items.iter().map(ReportRow::Child));
    }
    rows
}

/// Render the records into a finished workbook and return its bytes.
///
/// Deterministic given identical input, aside from the creation timestamp
/// the xlsx format itself embeds in its document properties.
pub fn render_workbook(records: &[InvoiceRecord]) -> Result<Vec<u8>, InvoiceError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Invoices_Master_Detail")?;

    let styles = Styles::new();
    write_header(worksheet, &styles)?;

    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    let rows = layout_rows(records);
    let mut child_span: Option<(u32, u32)> = None;

    for (offset, row) in rows.iter().enumerate() {
        let row_num = offset as u32 + 1;
        match row {
            ReportRow::Parent(record) => {
                if let Some((first, last)) = child_span.take() {
                    worksheet.group_rows_collapsed(first, last)?;
                }
                write_parent_row(worksheet, row_num, record, &styles)?;
            }
            ReportRow::Child(item) => {
                write_child_row(worksheet, row_num, item, &styles)?;
                child_span = Some(match child_span {
                    Some((first, _)) => (first, row_num),
                    None => (row_num, row_num),
                });
            }
        }
    }
    if let Some((first, last)) = child_span {
        worksheet.group_rows_collapsed(first, last)?;
    }

    // Invoice ids are deliberately text cells; silence the green-triangle
    // warnings across the sheet.
    worksheet.ignore_error_range(0, 0, 1_048_575, 15, IgnoreError::NumberStoredAsText)?;
    worksheet.autofilter(0, 0, rows.len() as u32, (HEADERS.len() - 1) as u16)?;

    Ok(workbook.save_to_buffer()?)
}

// ── Styles ───────────────────────────────────────────────────────────────

struct Styles {
    header: Format,
    parent_left: Format,
    parent_center: Format,
    parent_money: Format,
    child_left: Format,
    child_center: Format,
    child_money: Format,
}

impl Styles {
    fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0x1F4E78))
            .set_font_color(Color::White)
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);

        let parent = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0xDCE6F1))
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::VerticalCenter);
        let parent_left = parent.clone().set_align(FormatAlign::Left);
        let parent_center = parent.clone().set_align(FormatAlign::Center);
        let parent_money = parent_center.clone().set_num_format("#,##0.00");

        let child = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::VerticalCenter);
        let child_left = child.clone().set_align(FormatAlign::Left).set_indent(1);
        let child_center = child.clone().set_align(FormatAlign::Center);
        let child_money = child_center.clone().set_num_format("#,##0.00");

        Self {
            header,
            parent_left,
            parent_center,
            parent_money,
            child_left,
            child_center,
            child_money,
        }
    }
}

// ── Row writers ──────────────────────────────────────────────────────────

fn write_header(worksheet: &mut Worksheet, styles: &Styles) -> Result<(), InvoiceError> {
    for (col, title) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &styles.header)?;
    }
    Ok(())
}

fn write_parent_row(
    worksheet: &mut Worksheet,
    row: u32,
    record: &InvoiceRecord,
    styles: &Styles,
) -> Result<(), InvoiceError> {
    worksheet.write_string_with_format(row, 0, "INVOICE", &styles.parent_center)?;
    worksheet.write_string_with_format(row, 1, &record.filename, &styles.parent_left)?;
    // Literal text, never a number: "00042" must stay "00042".
    worksheet.write_string_with_format(row, 2, &record.invoice_id, &styles.parent_center)?;
    worksheet.write_string_with_format(row, 3, &record.date_issued, &styles.parent_center)?;
    worksheet.write_string_with_format(row, 4, &record.due_date, &styles.parent_center)?;
    worksheet.write_string_with_format(row, 5, &record.seller_name, &styles.parent_center)?;
    worksheet.write_string_with_format(row, 6, &record.buyer_name, &styles.parent_center)?;
    worksheet.write_string_with_format(row, 7, &record.bank_iban, &styles.parent_center)?;

    worksheet.write_string_with_format(row, 8, ITEMS_BELOW, &styles.parent_center)?;
    for col in 9..=11 {
        worksheet.write_blank(row, col, &styles.parent_center)?;
    }

    // Financials appear once, on the parent row only.
    worksheet.write_number_with_format(row, 12, record.tax_amount, &styles.parent_money)?;
    worksheet.write_number_with_format(row, 13, record.total_amount, &styles.parent_money)?;
    worksheet.write_string_with_format(row, 14, &record.currency, &styles.parent_center)?;
    worksheet.write_string_with_format(row, 15, &record.general_summary, &styles.parent_left)?;
    Ok(())
}

fn write_child_row(
    worksheet: &mut Worksheet,
    row: u32,
    item: &LineItem,
    styles: &Styles,
) -> Result<(), InvoiceError> {
    worksheet.write_string_with_format(row, 0, "Item", &styles.child_center)?;
    worksheet.write_blank(row, 1, &styles.child_left)?;
    for col in 2..=7 {
        worksheet.write_blank(row, col, &styles.child_center)?;
    }

    worksheet.write_string_with_format(row, 8, &item.description, &styles.child_left)?;
    worksheet.write_number_with_format(row, 9, item.quantity, &styles.child_center)?;
    worksheet.write_number_with_format(row, 10, item.unit_price, &styles.child_money)?;
    worksheet.write_number_with_format(row, 11, item.line_total, &styles.child_money)?;

    // Invoice-level financials stay blank on child rows.
    worksheet.write_blank(row, 12, &styles.child_money)?;
    worksheet.write_blank(row, 13, &styles.child_money)?;
    worksheet.write_blank(row, 14, &styles.child_center)?;
    worksheet.write_blank(row, 15, &styles.child_left)?;
    Ok(())
}
