use std::path::Path;

use pdf::Document;
use pdfdigest_core::paths;

use crate::pipeline::StageReport;
use crate::prelude::*;

/// Write every embedded image of `input` to
/// `<image_root>/<stem>/image_<page>_<index>.png`.
///
/// Failing to create the output directory or to open the document ends this
/// stage with an error; a page or image that fails is recorded and skipped.
pub async fn extract_images(input: &Path, image_root: &Path) -> Result<StageReport, Error> {
    log::info!("Extracting images from {}", input.display());
    let output_dir = paths::image_dir(image_root, input);
    tokio::fs::create_dir_all(&output_dir).await?;
    log::debug!("Directory {} created/exists", output_dir.display());

    let doc = Document::open(input).map_err(|e| Error::Open(e.to_string()))?;
    let mut stage = StageReport::new("images");

    for page in 0..doc.page_count() {
        let images = match doc.page_images(page) {
            Ok(images) => images,
            Err(err) => {
                stage.fail(format!("page {}", page), Error::Extraction(err.to_string()));
                continue;
            }
        };

        for (index, image) in images.iter().enumerate() {
            let file_name = paths::image_file_name(page, index);
            match tokio::fs::write(output_dir.join(&file_name), &image.bytes).await {
                Ok(()) => {
                    log::debug!("Saved image {} ({}, {})", file_name, image.id, image.format);
                    stage.succeed();
                }
                Err(err) => stage.fail(file_name, Error::Io(err)),
            }
        }
    }

    log::info!("Finished extracting images");
    Ok(stage)
}
