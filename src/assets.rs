use std::path::{Path, PathBuf};

use crate::error::ContextError;

const ADDRESS_FILE_NAME: &str = "address.txt";
const NOTES_FILE_NAME: &str = "notes.txt";
const PAYMENT_TERMS_FILE_NAME: &str = "payment_terms.txt";
const LOGO_URL_FILE_NAME: &str = "logo_url.txt";

const RAW_LOGO_FILE_NAME: &str = "logo.png";
const MAIN_LOGO_FILE_NAME: &str = "main_logo.png";

/// The largest dimension the prepared logo may have on either axis.
const LOGO_MAXIMUM_DIMENSION: u32 = 600;

/// The texts shared by every invoice: the sender address, the notes and the
/// payment terms, each kept as the raw content of its file.
#[derive(Debug, Clone)]
pub struct TextAssets {
    pub address: String,
    pub notes: String,
    pub payment_terms: String,
}

impl TextAssets {
    /// Reads the three shared texts from the given data directory.
    pub fn load_from_directory(data_directory: &Path) -> Result<TextAssets, ContextError> {
        Ok(TextAssets {
            address: read_text_file(&data_directory.join(ADDRESS_FILE_NAME))?,
            notes: read_text_file(&data_directory.join(NOTES_FILE_NAME))?,
            payment_terms: read_text_file(&data_directory.join(PAYMENT_TERMS_FILE_NAME))?,
        })
    }
}

fn read_text_file(path: &Path) -> Result<String, ContextError> {
    std::fs::read_to_string(path).map_err(|error| {
        ContextError::with_error(format!("Failed to read the file {:?}", path), &error)
    })
}

/// Makes sure a logo suitable for placement exists and returns its path. The
/// preparation runs at most once: a previously prepared logo is reused as is,
/// and a previously downloaded one is only shrunk. A missing URL or a failed
/// download is a warning rather than an error here; with nothing cached the
/// render later fails where the image is placed.
pub fn prepare_logo(
    data_directory: &Path,
    images_directory: &Path,
    logo_url_override: Option<&str>,
) -> Result<PathBuf, ContextError> {
    let main_logo_path = images_directory.join(MAIN_LOGO_FILE_NAME);
    if main_logo_path.exists() {
        log::debug!("Reusing the prepared logo at {:?}", main_logo_path);
        return Ok(main_logo_path);
    }

    let raw_logo_path = images_directory.join(RAW_LOGO_FILE_NAME);
    if !raw_logo_path.exists() {
        match resolve_logo_url(data_directory, logo_url_override)? {
            Some(logo_url) => {
                std::fs::create_dir_all(images_directory).map_err(|error| {
                    ContextError::with_error(
                        format!("Failed to create the directory {:?}", images_directory),
                        &error,
                    )
                })?;
                if let Err(error) = download_logo(&logo_url, &raw_logo_path) {
                    log::warn!("{}", error);
                }
            }
            None => log::warn!("No logo URL is configured"),
        }
    }

    if !raw_logo_path.exists() {
        log::warn!("No logo could be prepared at {:?}", main_logo_path);
        return Ok(main_logo_path);
    }

    shrink_logo(&raw_logo_path, &main_logo_path)?;
    Ok(main_logo_path)
}

/// The explicit override wins over the URL file, and a missing URL file simply
/// means no logo has been configured.
fn resolve_logo_url(
    data_directory: &Path,
    logo_url_override: Option<&str>,
) -> Result<Option<String>, ContextError> {
    if let Some(logo_url) = logo_url_override {
        return Ok(Some(logo_url.to_string()));
    }

    let logo_url_path = data_directory.join(LOGO_URL_FILE_NAME);
    if !logo_url_path.exists() {
        return Ok(None);
    }

    let logo_url = read_text_file(&logo_url_path)?;
    let logo_url = logo_url.trim();
    if logo_url.is_empty() {
        Ok(None)
    } else {
        Ok(Some(logo_url.to_string()))
    }
}

fn download_logo(logo_url: &str, raw_logo_path: &Path) -> Result<(), ContextError> {
    log::info!("Downloading the logo from {}", logo_url);
    let response = reqwest::blocking::get(logo_url)
        .and_then(|response| response.error_for_status())
        .map_err(|error| {
            ContextError::with_error(
                format!("Failed to download the logo from {}", logo_url),
                &error,
            )
        })?;
    let logo_bytes = response.bytes().map_err(|error| {
        ContextError::with_error(
            format!("Failed to read the logo downloaded from {}", logo_url),
            &error,
        )
    })?;

    std::fs::write(raw_logo_path, &logo_bytes).map_err(|error| {
        ContextError::with_error(
            format!("Failed to write the logo to {:?}", raw_logo_path),
            &error,
        )
    })
}

/// Shrinks the raw logo so that neither dimension exceeds the maximum, keeping
/// the aspect ratio, and saves the result next to it.
fn shrink_logo(raw_logo_path: &Path, main_logo_path: &Path) -> Result<(), ContextError> {
    let raw_logo = image::open(raw_logo_path).map_err(|error| {
        ContextError::with_error(
            format!("Failed to open the logo at {:?}", raw_logo_path),
            &error,
        )
    })?;
    let main_logo = raw_logo.thumbnail(LOGO_MAXIMUM_DIMENSION, LOGO_MAXIMUM_DIMENSION);
    main_logo.save(main_logo_path).map_err(|error| {
        ContextError::with_error(
            format!("Failed to save the shrunk logo to {:?}", main_logo_path),
            &error,
        )
    })
}

#[cfg(test)]
mod tests {
    use image::GenericImageView;
    use similar_asserts::assert_eq;

    use super::*;

    fn write_data_files(data_directory: &Path) {
        std::fs::write(
            data_directory.join(ADDRESS_FILE_NAME),
            "Paperleaf Stationers\n12 Mill Lane",
        )
        .unwrap();
        std::fs::write(data_directory.join(NOTES_FILE_NAME), "Thank you.").unwrap();
        std::fs::write(
            data_directory.join(PAYMENT_TERMS_FILE_NAME),
            "Payment is due within 30 days.",
        )
        .unwrap();
    }

    #[test]
    fn the_shared_texts_are_read_from_their_files() {
        let data_directory = tempfile::tempdir().unwrap();
        write_data_files(data_directory.path());

        let assets = TextAssets::load_from_directory(data_directory.path()).unwrap();
        assert_eq!(assets.address, "Paperleaf Stationers\n12 Mill Lane");
        assert_eq!(assets.notes, "Thank you.");
        assert_eq!(assets.payment_terms, "Payment is due within 30 days.");
    }

    #[test]
    fn a_missing_text_file_is_reported_with_its_path() {
        let data_directory = tempfile::tempdir().unwrap();

        let error = TextAssets::load_from_directory(data_directory.path()).unwrap_err();
        assert!(error.to_string().contains(ADDRESS_FILE_NAME));
    }

    #[test]
    fn an_already_prepared_logo_is_reused() {
        let data_directory = tempfile::tempdir().unwrap();
        let images_directory = tempfile::tempdir().unwrap();
        let main_logo_path = images_directory.path().join(MAIN_LOGO_FILE_NAME);
        std::fs::write(&main_logo_path, b"not really an image").unwrap();

        let prepared_path =
            prepare_logo(data_directory.path(), images_directory.path(), None).unwrap();
        assert_eq!(prepared_path, main_logo_path);
    }

    #[test]
    fn a_missing_url_is_not_fatal_until_the_image_is_placed() {
        let data_directory = tempfile::tempdir().unwrap();
        let images_directory = tempfile::tempdir().unwrap();

        let prepared_path =
            prepare_logo(data_directory.path(), images_directory.path(), None).unwrap();

        // The logo keeps its place in the layout even when no URL is
        // configured; the missing file fails the render that places it
        assert_eq!(
            prepared_path,
            images_directory.path().join(MAIN_LOGO_FILE_NAME)
        );
        assert!(!prepared_path.exists());
    }

    #[test]
    fn an_already_downloaded_logo_is_shrunk_without_any_url() {
        let data_directory = tempfile::tempdir().unwrap();
        let images_directory = tempfile::tempdir().unwrap();
        let raw_logo_path = images_directory.path().join(RAW_LOGO_FILE_NAME);
        let raw_logo = image::RgbImage::from_fn(900, 900, |_, _| image::Rgb([10, 20, 30]));
        raw_logo.save(&raw_logo_path).unwrap();

        let prepared_path =
            prepare_logo(data_directory.path(), images_directory.path(), None).unwrap();
        assert_eq!(
            prepared_path,
            images_directory.path().join(MAIN_LOGO_FILE_NAME)
        );

        let main_logo = image::open(&prepared_path).unwrap();
        assert_eq!(main_logo.dimensions(), (600, 600));
    }

    #[test]
    fn a_failing_download_is_not_fatal_until_the_image_is_placed() {
        let data_directory = tempfile::tempdir().unwrap();
        let images_directory = tempfile::tempdir().unwrap();

        let prepared_path = prepare_logo(
            data_directory.path(),
            images_directory.path(),
            Some("http://127.0.0.1:0/logo.png"),
        )
        .unwrap();

        // The configured logo keeps its place in the layout; the missing
        // file only fails the render that tries to place it
        assert_eq!(
            prepared_path,
            images_directory.path().join(MAIN_LOGO_FILE_NAME)
        );
        assert!(!prepared_path.exists());
    }

    #[test]
    fn a_blank_url_file_counts_as_no_url() {
        let data_directory = tempfile::tempdir().unwrap();
        std::fs::write(data_directory.path().join(LOGO_URL_FILE_NAME), "  \n").unwrap();

        let resolved_url = resolve_logo_url(data_directory.path(), None).unwrap();
        assert_eq!(resolved_url, None);
    }

    #[test]
    fn the_override_wins_over_the_url_file() {
        let data_directory = tempfile::tempdir().unwrap();
        std::fs::write(
            data_directory.path().join(LOGO_URL_FILE_NAME),
            "https://example.org/from-file.png",
        )
        .unwrap();

        let resolved_url = resolve_logo_url(
            data_directory.path(),
            Some("https://example.org/from-override.png"),
        )
        .unwrap();
        assert_eq!(
            resolved_url,
            Some("https://example.org/from-override.png".to_string())
        );
    }

    #[test]
    fn shrinking_keeps_the_aspect_ratio_within_the_bounds() {
        let images_directory = tempfile::tempdir().unwrap();
        let raw_logo_path = images_directory.path().join(RAW_LOGO_FILE_NAME);
        let main_logo_path = images_directory.path().join(MAIN_LOGO_FILE_NAME);

        let raw_logo = image::RgbImage::from_fn(1200, 800, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 127])
        });
        raw_logo.save(&raw_logo_path).unwrap();

        shrink_logo(&raw_logo_path, &main_logo_path).unwrap();

        let main_logo = image::open(&main_logo_path).unwrap();
        assert_eq!(main_logo.dimensions(), (600, 400));
    }
}
