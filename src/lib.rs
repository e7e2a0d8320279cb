//! Invoicr generates invoice PDF documents for a small shop. An `Invoice` is a
//! plain value made of orders against shared products, and the rendering
//! pipeline turns it first into an intermediate `Document` made of drawing
//! operations, then into an actual PDF file. Because every stage of this
//! pipeline is deterministic, rendering the same invoice twice on the same day
//! produces byte-identical files, which is what the test suite relies on.
//!
//! The crate also ships a batch driver that can fabricate seeded random
//! invoices for a pool of customers and render them either sequentially or on
//! a rayon worker pool, which is how the `invoicr` binary exercises the
//! library end to end.

/// The loading of the shared render inputs: the sender address, the notes and
/// the payment terms texts, plus the preparation of the logo. The logo is
/// downloaded once and shrunk to a thumbnail; afterwards the prepared file is
/// reused as is, so the preparation can run before every batch without cost.
pub mod assets;

/// The batch driver.
///
/// # Introduction
///
/// This module fabricates invoices from a seeded random generator, so that a
/// run can be repeated exactly by passing the same seed, and drives the
/// renderer over a whole batch of them. Two drivers are available: the
/// sequential one stops at the first failure, while the parallel one runs on
/// the rayon worker pool, attempts every invoice and reports all the failed
/// customers together. The module also takes care of the bookkeeping around a
/// batch, namely saving and loading invoice fixtures as JSON and sweeping the
/// rendered PDF files out of the output directory.
pub mod batch;

/// The module where the `Document` interface is presented.
///
/// # Introduction
///
/// The entry point of this module is the `Document` struct. One can be built
/// either from code or from a JSON document which comprises a document ID, an
/// instance ID and the list of operations to replay. This struct acts as an
/// intermediate representation of what the rendered page contains, namely
/// text with its position, color, font weight, size and alignment, but also
/// images, filled rectangles and lines. For the supported operations see the
/// `Operation` enum.
///
/// Keeping this representation around, instead of going from an invoice
/// straight to a PDF, means the layout can be inspected and asserted on
/// without parsing any PDF content, and the conversion into the final format
/// stays confined to the `to_pdf_document` and `save_to_pdf_file` methods.
pub mod document;

/// This module contains the `ContextError` type which is the error type used
/// throughout this library.
///
/// The reason why this type exists is to uniform the error reporting without
/// introducing an error code for every possible failure, which for a library
/// of this size would be out of scope. Whenever a function returns an error
/// the end user can expect a human-readable explanation, and when the error
/// was caused by another one deeper down, the propagated error is carried
/// along in the message.
pub mod error;

/// The invoice domain types: `Product`, `Order` and `Invoice`.
///
/// # Introduction
///
/// These are plain values. A `Product` is a name with a unit price, an
/// `Order` is a quantity of one product bought by a customer on a date, and
/// an `Invoice` collects the orders of one customer in the order they were
/// added, which is also the order they render in. The cost of an order is
/// frozen to whole cents when the order is created, so a later change of the
/// quantity or the product price does not silently rewrite an already issued
/// invoice; the balance due is recomputed from the quantities and the unit
/// prices and only rounded where it is formatted.
pub mod invoice;

/// The invoice template. The one public entry point, `compose`, lays an
/// invoice out as a `Document` by emitting drawing operations at fixed
/// millimeter coordinates: caption, logo, issue date, the address and
/// recipient blocks, the balance banner, the order table and the closing
/// sentences. The composition is pure, which keeps it easy to test.
pub mod layout;

/// The module where the `PdfDocument` interface for working with PDF
/// documents is presented.
///
/// # Introduction
///
/// The main component of this module is the struct `PdfDocument`, a thin
/// layer over `lopdf` with convenience functions such as
/// `add_page_with_layer`, `write_text_to_layer_in_page`,
/// `draw_filled_rectangle_in_page`, `place_image_in_page`, `write_all` and
/// `save_to_bytes`, which allow the end user to interact with a PDF document
/// in a meaningful way while the complexity stays hidden below a curtain of
/// private methods.
///
/// Text is set in the two built-in Helvetica faces, so no font file has to be
/// embedded; the glyph widths needed for centering and right-alignment are
/// tabulated in this module. Everything that would normally vary between two
/// runs, like timestamps and identifiers, is pinned to fixed values, so the
/// produced bytes depend only on the operations that were replayed.
pub mod pdf;

/// The `InvoiceRenderer`, the stage that ties assets, settings and layout
/// together. Construction loads the shared texts and prepares the logo once,
/// and fails before any invoice is touched when the inputs are incomplete.
pub mod renderer;

/// The `RenderSettings` configuration, loadable from a JSON file with
/// defaults for every field.
pub mod settings;
