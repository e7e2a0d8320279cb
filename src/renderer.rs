use std::path::PathBuf;

use time::{Date, OffsetDateTime};

use crate::assets::{self, TextAssets};
use crate::document::Document;
use crate::error::ContextError;
use crate::invoice::Invoice;
use crate::layout;
use crate::settings::RenderSettings;

/// Renders invoices to PDF files. Construction reads the shared texts and
/// prepares the logo once, so that the per invoice work is a pure composition
/// step followed by a file write. A renderer that failed to construct has
/// touched no invoice, which keeps a misconfigured run from producing a
/// partial batch.
pub struct InvoiceRenderer {
    pub settings: RenderSettings,
    assets: TextAssets,
    logo_path: PathBuf,
}

impl InvoiceRenderer {
    pub fn new(settings: RenderSettings) -> Result<InvoiceRenderer, ContextError> {
        let assets = TextAssets::load_from_directory(&settings.data_directory)?;
        let logo_path = assets::prepare_logo(
            &settings.data_directory,
            &settings.images_directory,
            settings.logo_url.as_deref(),
        )?;
        Ok(InvoiceRenderer {
            settings,
            assets,
            logo_path,
        })
    }

    /// Composes the document for an invoice issued today.
    pub fn compose_document(&self, invoice: &Invoice) -> Result<Document, ContextError> {
        self.compose_document_for_date(invoice, today())
    }

    /// Composes the document for an invoice issued on the given date. With the
    /// issue date pinned the composition is fully deterministic.
    pub fn compose_document_for_date(
        &self,
        invoice: &Invoice,
        issue_date: Date,
    ) -> Result<Document, ContextError> {
        layout::compose(
            invoice,
            &self.assets.address,
            &self.assets.notes,
            &self.assets.payment_terms,
            &self.logo_path,
            issue_date,
            &self.settings,
        )
    }

    /// Renders one invoice into the output directory and returns the path of
    /// the written file.
    pub fn render_to_file(&self, invoice: &Invoice) -> Result<PathBuf, ContextError> {
        std::fs::create_dir_all(&self.settings.output_directory).map_err(|error| {
            ContextError::with_error(
                format!(
                    "Failed to create the directory {:?}",
                    self.settings.output_directory
                ),
                &error,
            )
        })?;

        let output_path = self
            .settings
            .output_directory
            .join(format!("{}.pdf", layout::output_file_stem(&invoice.name)));
        let document = self.compose_document(invoice)?;
        document.save_to_pdf_file(&output_path)?;
        log::debug!("Rendered the invoice for {} to {:?}", invoice.name, output_path);

        Ok(output_path)
    }
}

/// The local date, falling back to UTC when the local offset cannot be
/// determined.
pub(crate) fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use similar_asserts::assert_eq;
    use time::macros::date;

    use super::*;
    use crate::document::Operation;
    use crate::invoice::{Order, Product};

    fn settings_in(temporary_directory: &std::path::Path) -> RenderSettings {
        let data_directory = temporary_directory.join("data");
        std::fs::create_dir_all(&data_directory).unwrap();
        std::fs::write(data_directory.join("address.txt"), "Paperleaf\n12 Mill Lane").unwrap();
        std::fs::write(data_directory.join("notes.txt"), "Thank you.").unwrap();
        std::fs::write(data_directory.join("payment_terms.txt"), "Due in 30 days.").unwrap();

        RenderSettings {
            data_directory,
            images_directory: temporary_directory.join("images"),
            output_directory: temporary_directory.join("invoices"),
            ..RenderSettings::default()
        }
    }

    fn sample_invoice() -> Invoice {
        let bread = Arc::new(Product::new("Bread", 2.4));
        Invoice::new(
            "Matilda",
            date!(2024 - 03 - 05),
            vec![Order::new("Matilda", 2.0, date!(2024 - 03 - 05), bread)],
        )
    }

    fn write_logo_image(images_directory: &std::path::Path) {
        std::fs::create_dir_all(images_directory).unwrap();
        let logo =
            image::RgbImage::from_fn(64, 64, |x, y| image::Rgb([(x * 3) as u8, (y * 3) as u8, 96]));
        logo.save(images_directory.join("main_logo.png")).unwrap();
    }

    #[test]
    fn the_composed_document_always_places_the_logo() {
        let temporary_directory = tempfile::tempdir().unwrap();
        let renderer = InvoiceRenderer::new(settings_in(temporary_directory.path())).unwrap();

        let document = renderer
            .compose_document_for_date(&sample_invoice(), date!(2024 - 03 - 11))
            .unwrap();
        let expected_logo_path = temporary_directory
            .path()
            .join("images")
            .join("main_logo.png");
        assert!(document.operations.iter().any(|operation| matches!(
            operation,
            Operation::Image { image_path, .. } if image_path == &expected_logo_path
        )));
    }

    #[test]
    fn an_unconfigured_logo_fails_the_render_at_the_image_placement() {
        let temporary_directory = tempfile::tempdir().unwrap();
        // Preparation only warns, so the renderer still comes up
        let renderer = InvoiceRenderer::new(settings_in(temporary_directory.path())).unwrap();

        let error = renderer.render_to_file(&sample_invoice()).unwrap_err();
        assert!(error.to_string().contains("main_logo.png"));
        assert!(!temporary_directory
            .path()
            .join("invoices")
            .join("Matilda's_invoice.pdf")
            .exists());
    }

    #[test]
    fn construction_fails_before_any_invoice_when_the_texts_are_missing() {
        let temporary_directory = tempfile::tempdir().unwrap();
        let settings = RenderSettings {
            data_directory: temporary_directory.path().join("nowhere"),
            ..RenderSettings::default()
        };

        assert!(InvoiceRenderer::new(settings).is_err());
    }

    #[test]
    fn rendering_writes_the_invoice_under_the_customer_name() {
        let temporary_directory = tempfile::tempdir().unwrap();
        write_logo_image(&temporary_directory.path().join("images"));
        let renderer = InvoiceRenderer::new(settings_in(temporary_directory.path())).unwrap();

        let output_path = renderer.render_to_file(&sample_invoice()).unwrap();
        assert_eq!(
            output_path,
            temporary_directory
                .path()
                .join("invoices")
                .join("Matilda's_invoice.pdf")
        );

        let written_bytes = std::fs::read(&output_path).unwrap();
        assert!(written_bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn rendering_the_same_invoice_for_the_same_date_is_reproducible() {
        let temporary_directory = tempfile::tempdir().unwrap();
        write_logo_image(&temporary_directory.path().join("images"));
        let renderer = InvoiceRenderer::new(settings_in(temporary_directory.path())).unwrap();
        let invoice = sample_invoice();

        let first_document = renderer
            .compose_document_for_date(&invoice, date!(2024 - 03 - 11))
            .unwrap();
        let second_document = renderer
            .compose_document_for_date(&invoice, date!(2024 - 03 - 11))
            .unwrap();
        assert_eq!(
            first_document.save_to_pdf_bytes().unwrap(),
            second_document.save_to_pdf_bytes().unwrap()
        );
    }
}
