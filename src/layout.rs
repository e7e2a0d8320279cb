use std::path::Path;

use time::macros::format_description;
use time::Date;

use crate::document::{Document, FontWeight, Operation, TextAlignment};
use crate::error::ContextError;
use crate::invoice::{format_quantity, Invoice};
use crate::settings::RenderSettings;

/// Width of the invoice page in millimeters.
pub const PAGE_WIDTH: f64 = 216.04;
/// Height of the invoice page in millimeters.
pub const PAGE_HEIGHT: f64 = 279.39;

/// The margin the centered texts are balanced against.
const PAGE_RIGHT_MARGIN: f64 = 10.0;

/// The caption in the top right corner.
const CAPTION_FONT_SIZE: f64 = 29.0;
const CAPTION_ANCHOR: [f64; 2] = [204.0, 14.0];

/// The logo placement in the top left corner.
const LOGO_POSITION: [f64; 2] = [12.8, 5.0];
const LOGO_SIZE: [f64; 2] = [30.0, 30.0];

/// The issue date line, a grey label with a black value next to it.
const DATE_LABEL_POSITION: [f64; 2] = [153.0, 37.0];
const DATE_VALUE_POSITION: [f64; 2] = [177.5, 37.0];

/// The sender address block, one line under the other.
const ADDRESS_POSITION: [f64; 2] = [16.28, 42.0];
const ADDRESS_LINE_ADVANCE: f64 = 4.3;

/// The recipient block under the sender address.
const BILL_TO_LABEL_POSITION: [f64; 2] = [16.28, 60.43];
const BILL_TO_NAME_POSITION: [f64; 2] = [16.28, 66.175];

/// The banner carrying the balance due. Each of the two texts is centered
/// between its column start and the right margin of the page.
const BALANCE_BANNER_POSITION: [f64; 2] = [112.5, 42.0];
const BALANCE_BANNER_SIZE: [f64; 2] = [95.0, 8.8];
const BALANCE_FONT_SIZE: f64 = 12.0;
const BALANCE_BASELINE: f64 = 46.4;
const BALANCE_LABEL_COLUMN_X: f64 = 92.0;
const BALANCE_VALUE_COLUMN_X: f64 = 183.0;

/// The dark bar behind the table header and the separators between its columns.
const TABLE_BAR_POSITION: [f64; 2] = [10.5, 93.75];
const TABLE_BAR_SIZE: [f64; 2] = [195.0, 7.6];
const TABLE_SEPARATOR_XS: [f64; 3] = [124.5, 151.5, 179.0];
const TABLE_SEPARATOR_TOP: f64 = 93.85;
const TABLE_SEPARATOR_HEIGHT: f64 = 7.4;

/// The table header labels, white on the dark bar.
const TABLE_HEADER_BASELINE: f64 = 97.5;
const HEADER_ITEM_X: f64 = 15.15;
const HEADER_QUANTITY_X: f64 = 129.0;
const HEADER_RATE_X: f64 = 165.0;
const HEADER_AMOUNT_X: f64 = 187.0;

/// The table rows, one order per row.
const FIRST_ROW_BASELINE: f64 = 107.0;
const ROW_ADVANCE: f64 = 8.0;
const ROW_ITEM_X: f64 = 15.1;

/// The total line under the table and the two sentence blocks at the bottom.
const TOTAL_OFFSET: f64 = 15.0;
const TOTAL_LABEL_X: f64 = 153.0;
const SENTENCES_X: f64 = 16.0;
const SENTENCES_HEADER_OFFSET: f64 = 30.0;
const SENTENCES_FIRST_LINE_ADVANCE: f64 = 7.5;
const SENTENCES_LINE_ADVANCE: f64 = 5.0;
const TERMS_ROW_OFFSET: f64 = 50.0;

/// The body font size shared by everything that is not the caption or the balance.
const BODY_FONT_SIZE: f64 = 10.0;

/// The pitch of the debug grid in millimeters.
const GRID_STEP: f64 = 20.0;

/// Converts a color given in the usual byte range into the zero to one
/// components the drawing operations carry.
fn rgb(red: u8, green: u8, blue: u8) -> [f64; 3] {
    [
        red as f64 / 255.0,
        green as f64 / 255.0,
        blue as f64 / 255.0,
    ]
}

/// A neutral grey with the same level on every component.
fn grey(level: u8) -> [f64; 3] {
    rgb(level, level, level)
}

/// Formats a monetary amount the way it appears on the page.
pub fn format_money(currency_symbol: &str, amount: f64) -> String {
    format!("{}{:.2}", currency_symbol, amount)
}

/// Lays out one invoice as a flat list of drawing operations. The composition
/// is a pure function of its inputs: the same invoice, assets, issue date and
/// settings give the same document, which is what makes the rendering
/// reproducible.
///
/// The logo is always placed; whether the file behind the path exists is only
/// checked when the document is turned into a PDF.
pub fn compose(
    invoice: &Invoice,
    address: &str,
    notes: &str,
    payment_terms: &str,
    logo_path: &Path,
    issue_date: Date,
    settings: &RenderSettings,
) -> Result<Document, ContextError> {
    let mut operations = Vec::new();

    operations.push(Operation::AppendNewPage {
        page_width: settings.page_width,
        page_height: settings.page_height,
    });

    // The grid goes in first so that the content paints over it
    if settings.draw_debug_grid {
        push_debug_grid(&mut operations, settings.page_width, settings.page_height);
    }

    // The caption in the top right corner, anchored by its right edge
    operations.push(Operation::UnicodeText {
        color: grey(65),
        position: CAPTION_ANCHOR,
        text_string: "INVOICE".to_string(),
        font_size: CAPTION_FONT_SIZE,
        font_weight: FontWeight::Regular,
        alignment: TextAlignment::Right,
    });

    operations.push(Operation::Image {
        image_path: logo_path.to_path_buf(),
        position: LOGO_POSITION,
        size: LOGO_SIZE,
    });

    // The issue date, a grey label with the spelled out date next to it
    let formatted_issue_date = issue_date
        .format(format_description!("[month repr:long] [day], [year]"))
        .map_err(|error| ContextError::with_error("Failed to format the issue date", &error))?;
    operations.push(Operation::UnicodeText {
        color: grey(95),
        position: DATE_LABEL_POSITION,
        text_string: "Date:".to_string(),
        font_size: BODY_FONT_SIZE,
        font_weight: FontWeight::Regular,
        alignment: TextAlignment::Left,
    });
    operations.push(Operation::UnicodeText {
        color: grey(0),
        position: DATE_VALUE_POSITION,
        text_string: formatted_issue_date,
        font_size: BODY_FONT_SIZE,
        font_weight: FontWeight::Regular,
        alignment: TextAlignment::Left,
    });

    // The sender address block, with the first line set off in bold
    let [address_x, address_first_baseline] = ADDRESS_POSITION;
    for (line_index, line) in address.lines().enumerate() {
        operations.push(Operation::UnicodeText {
            color: grey(0),
            position: [
                address_x,
                address_first_baseline + line_index as f64 * ADDRESS_LINE_ADVANCE,
            ],
            text_string: line.to_string(),
            font_size: BODY_FONT_SIZE,
            font_weight: if line_index == 0 {
                FontWeight::Bold
            } else {
                FontWeight::Regular
            },
            alignment: TextAlignment::Left,
        });
    }

    // The recipient block, the label in regular and the name in bold
    operations.push(Operation::UnicodeText {
        color: grey(0),
        position: BILL_TO_LABEL_POSITION,
        text_string: "Bill To:".to_string(),
        font_size: BODY_FONT_SIZE,
        font_weight: FontWeight::Regular,
        alignment: TextAlignment::Left,
    });
    operations.push(Operation::UnicodeText {
        color: grey(0),
        position: BILL_TO_NAME_POSITION,
        text_string: invoice.name.clone(),
        font_size: BODY_FONT_SIZE,
        font_weight: FontWeight::Bold,
        alignment: TextAlignment::Left,
    });

    // The balance banner with the amount due centered on it
    let balance_label_center_x =
        (BALANCE_LABEL_COLUMN_X + settings.page_width - PAGE_RIGHT_MARGIN) / 2.0;
    let balance_value_center_x =
        (BALANCE_VALUE_COLUMN_X + settings.page_width - PAGE_RIGHT_MARGIN) / 2.0;
    operations.push(Operation::FilledRectangle {
        color: grey(230),
        position: BALANCE_BANNER_POSITION,
        size: BALANCE_BANNER_SIZE,
    });
    operations.push(Operation::UnicodeText {
        color: grey(65),
        position: [balance_label_center_x, BALANCE_BASELINE],
        text_string: "Balance Due:".to_string(),
        font_size: BALANCE_FONT_SIZE,
        font_weight: FontWeight::Bold,
        alignment: TextAlignment::Center,
    });
    operations.push(Operation::UnicodeText {
        color: grey(65),
        position: [balance_value_center_x, BALANCE_BASELINE],
        text_string: format_money(&settings.currency_symbol, invoice.balance()),
        font_size: BALANCE_FONT_SIZE,
        font_weight: FontWeight::Bold,
        alignment: TextAlignment::Center,
    });

    // The dark bar behind the table header, with the column separators on it
    operations.push(Operation::FilledRectangle {
        color: grey(65),
        position: TABLE_BAR_POSITION,
        size: TABLE_BAR_SIZE,
    });
    for separator_x in TABLE_SEPARATOR_XS {
        operations.push(Operation::Line {
            color: grey(95),
            from: [separator_x, TABLE_SEPARATOR_TOP],
            to: [separator_x, TABLE_SEPARATOR_TOP + TABLE_SEPARATOR_HEIGHT],
        });
    }

    // The table header labels, white on the dark bar
    for (header_x, header_text) in [
        (HEADER_ITEM_X, "Item"),
        (HEADER_QUANTITY_X, "Quantity"),
        (HEADER_RATE_X, "Rate"),
        (HEADER_AMOUNT_X, "Amount"),
    ] {
        operations.push(Operation::UnicodeText {
            color: grey(255),
            position: [header_x, TABLE_HEADER_BASELINE],
            text_string: header_text.to_string(),
            font_size: BODY_FONT_SIZE,
            font_weight: FontWeight::Regular,
            alignment: TextAlignment::Left,
        });
    }

    // One row per order: the product in bold, then quantity, rate and amount
    let mut row_baseline = FIRST_ROW_BASELINE;
    for order in &invoice.orders {
        operations.push(Operation::UnicodeText {
            color: grey(0),
            position: [ROW_ITEM_X, row_baseline],
            text_string: order.product.name.clone(),
            font_size: BODY_FONT_SIZE,
            font_weight: FontWeight::Bold,
            alignment: TextAlignment::Left,
        });
        for (column_x, column_text) in [
            (HEADER_QUANTITY_X, format_quantity(order.quantity)),
            (
                HEADER_RATE_X,
                format_money(&settings.currency_symbol, order.product.price),
            ),
            (
                HEADER_AMOUNT_X,
                format_money(
                    &settings.currency_symbol,
                    order.quantity * order.product.price,
                ),
            ),
        ] {
            operations.push(Operation::UnicodeText {
                color: grey(0),
                position: [column_x, row_baseline],
                text_string: column_text,
                font_size: BODY_FONT_SIZE,
                font_weight: FontWeight::Regular,
                alignment: TextAlignment::Left,
            });
        }
        row_baseline += ROW_ADVANCE;
    }

    // The total line under the table, a faint label with the amount in black
    operations.push(Operation::UnicodeText {
        color: grey(145),
        position: [TOTAL_LABEL_X, row_baseline + TOTAL_OFFSET],
        text_string: "Total:".to_string(),
        font_size: BODY_FONT_SIZE,
        font_weight: FontWeight::Regular,
        alignment: TextAlignment::Left,
    });
    operations.push(Operation::UnicodeText {
        color: grey(0),
        position: [HEADER_AMOUNT_X, row_baseline + TOTAL_OFFSET],
        text_string: format_money(&settings.currency_symbol, invoice.balance()),
        font_size: BODY_FONT_SIZE,
        font_weight: FontWeight::Regular,
        alignment: TextAlignment::Left,
    });

    // The two sentence blocks at the bottom of the page
    push_sentences(&mut operations, "Notes", notes, row_baseline);
    push_sentences(
        &mut operations,
        "Terms",
        payment_terms,
        row_baseline + TERMS_ROW_OFFSET,
    );

    let instance_id = invoice
        .date
        .format(format_description!("[year][month][day]"))
        .map_err(|error| ContextError::with_error("Failed to format the invoice date", &error))?;

    Ok(Document {
        document_id: output_file_stem(&invoice.name),
        instance_id,
        operations,
    })
}

/// Appends a faint header followed by its sentences, one line under the other.
fn push_sentences(operations: &mut Vec<Operation>, header: &str, sentences: &str, row: f64) {
    let header_baseline = row + SENTENCES_HEADER_OFFSET;
    operations.push(Operation::UnicodeText {
        color: grey(145),
        position: [SENTENCES_X, header_baseline],
        text_string: format!("{}:", header),
        font_size: BODY_FONT_SIZE,
        font_weight: FontWeight::Regular,
        alignment: TextAlignment::Left,
    });

    let mut line_baseline = header_baseline + SENTENCES_FIRST_LINE_ADVANCE;
    for line in sentences.lines() {
        operations.push(Operation::UnicodeText {
            color: grey(55),
            position: [SENTENCES_X, line_baseline],
            text_string: line.to_string(),
            font_size: BODY_FONT_SIZE,
            font_weight: FontWeight::Regular,
            alignment: TextAlignment::Left,
        });
        line_baseline += SENTENCES_LINE_ADVANCE;
    }
}

/// Appends the placement grid, vertical lines in a darker grey and horizontal
/// lines in a lighter one.
fn push_debug_grid(operations: &mut Vec<Operation>, page_width: f64, page_height: f64) {
    let mut grid_x = 0.0;
    while grid_x <= page_width {
        operations.push(Operation::Line {
            color: grey(95),
            from: [grid_x, 0.0],
            to: [grid_x, page_height],
        });
        grid_x += GRID_STEP;
    }

    let mut grid_y = 0.0;
    while grid_y <= page_height {
        operations.push(Operation::Line {
            color: grey(175),
            from: [0.0, grid_y],
            to: [page_width, grid_y],
        });
        grid_y += GRID_STEP;
    }
}

/// The file stem an invoice is saved under, without the `.pdf` extension.
pub fn output_file_stem(customer_name: &str) -> String {
    format!("{}'s_invoice", customer_name)
}
