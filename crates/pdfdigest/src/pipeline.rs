use std::fmt;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use pdf::Document;
use pdfdigest_core::report::{render_file_analysis, render_structure, render_summary, FileAnalysis};
use pdfdigest_core::summary::join_page_summaries;
use pdfdigest_core::{paths, stats};

use crate::config::{Config, RetryPolicy};
use crate::prelude::*;
use crate::prelude::println;
use crate::report::ReportWriter;
use crate::summarizer::{summarize_or_empty, try_summarize, Summarizer};

/// What happened to the units of work (pages, images) of one stage.
#[derive(Debug)]
pub struct StageReport {
    pub stage: &'static str,
    pub succeeded: usize,
    pub failures: Vec<(String, Error)>,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            succeeded: 0,
            failures: Vec::new(),
        }
    }

    /// A stage that could not run at all.
    fn aborted(stage: &'static str, err: Error) -> Self {
        let mut report = Self::new(stage);
        report.fail("stage", err);
        report
    }

    pub fn succeed(&mut self) {
        self.succeeded += 1;
    }

    pub fn fail(&mut self, unit: impl Into<String>, err: Error) {
        let unit = unit.into();
        log::error!("[{}] {}: {}", self.stage, unit, err);
        self.failures.push((unit, err));
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} succeeded, {} failed",
            self.stage,
            self.succeeded,
            self.failures.len()
        )
    }
}

#[derive(Debug)]
pub struct Outcome {
    /// `None` when the summary stage could not run.
    pub summary: Option<String>,
    pub stages: Vec<StageReport>,
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

fn open(input: &Path) -> Result<Document, Error> {
    Document::open(input).map_err(|e| Error::Open(e.to_string()))
}

/// File statistics and detected structure, appended as two report blocks.
async fn analyze_file(input: &Path, report: &ReportWriter) -> Result<StageReport, Error> {
    log::info!("File analysis started");
    let mut stage = StageReport::new("analysis");

    let (analysis, structure) = {
        let doc = open(input)?;
        log::info!("Successfully opened pdf file: {}", input.display());
        let metadata = doc.metadata();
        log::debug!(
            "title: {:?}, author: {:?}, creator: {:?}",
            metadata.title,
            metadata.author,
            metadata.creator
        );

        let mut pages = Vec::with_capacity(doc.page_count());
        for (index, page) in doc.decode_pages().into_iter().enumerate() {
            match page {
                Ok(layout) => {
                    stage.succeed();
                    pages.push(layout);
                }
                Err(err) => stage.fail(
                    format!("page {}", index),
                    Error::Extraction(err.to_string()),
                ),
            }
        }

        log::info!("Detecting titles and sections");
        let structure = pdf::classify(&pages);

        let text = pages
            .iter()
            .map(|page| pdf::text::page_text(&page.blocks))
            .collect::<Vec<_>>()
            .join("\n");

        let analysis = FileAnalysis {
            file_name: input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            page_count: doc.page_count(),
            byte_size: tokio::fs::metadata(input).await?.len(),
            stats: stats::analyze_text(&text),
        };
        (analysis, structure)
    };

    log::info!(
        "{} pages, {} words, {} titles, {} sections",
        analysis.page_count,
        analysis.stats.total_words,
        structure.titles.len(),
        structure.sections.len()
    );

    let mut block = render_file_analysis(&analysis);
    block.push_str(&render_structure(&structure));
    report.append(&block).await?;

    log::info!("File analysis completed");
    Ok(stage)
}

/// Summarize each page, then the page summaries. The final summary is
/// printed and appended to the report; it is empty if the model never answered.
async fn summarize_file<S: Summarizer>(
    input: &Path,
    summarizer: Option<&S>,
    policy: RetryPolicy,
    report: &ReportWriter,
) -> Result<(StageReport, String), Error> {
    log::info!("Start summarizing PDF file: {}", input.display());
    let mut stage = StageReport::new("summary");

    let answer = match summarizer {
        None => {
            stage.fail("model", Error::Open("no model client available".to_string()));
            String::new()
        }
        Some(summarizer) => {
            let doc = open(input)?;
            let spinner = spinner();
            let mut page_summaries = Vec::new();
            let count = doc.page_count();
            for page in 0..count {
                spinner.set_message(format!("Summarizing page {}/{}", page + 1, count));
                let text = match doc.page_text(page) {
                    Ok(text) => text,
                    Err(err) => {
                        stage.fail(
                            format!("page {}", page),
                            Error::Extraction(err.to_string()),
                        );
                        continue;
                    }
                };
                if text.trim().is_empty() {
                    log::debug!("Page {} has no text, skipping", page);
                    continue;
                }
                match try_summarize(summarizer, &text, policy).await {
                    Ok(summary) => {
                        stage.succeed();
                        page_summaries.push(summary);
                    }
                    Err(err) => stage.fail(format!("page {}", page), err),
                }
            }
            drop(doc);

            let joined = join_page_summaries(&page_summaries);
            let answer = if joined.is_empty() {
                log::warn!("No page summaries; skipping the global summary");
                String::new()
            } else {
                log::info!("Creating global summary from page summaries");
                spinner.set_message("Summarizing document");
                summarize_or_empty(summarizer, &joined, policy).await
            };
            spinner.finish_and_clear();
            answer
        }
    };

    println!("{}", answer);
    report.append(&render_summary(&answer)).await?;
    Ok((stage, answer))
}

/// Run every stage in order: report initialization, file analysis and
/// structure, summary, images.
///
/// Only a report file that cannot be created is an error. Every other
/// failure is logged and recorded in the returned [`Outcome`].
pub async fn run<S: Summarizer>(
    config: &Config,
    input: &Path,
    summarizer: Option<&S>,
) -> Result<Outcome> {
    let report_path = paths::report_path(&config.report_dir, input);
    let report = ReportWriter::create(report_path.clone())
        .await
        .wrap_err_with(|| format!("Failed to create report file {}", report_path.display()))?;

    let mut stages = Vec::new();

    stages.push(
        analyze_file(input, &report)
            .await
            .unwrap_or_else(|err| StageReport::aborted("analysis", err)),
    );

    let summary = match summarize_file(input, summarizer, config.summary, &report).await {
        Ok((stage, answer)) => {
            stages.push(stage);
            Some(answer)
        }
        Err(err) => {
            stages.push(StageReport::aborted("summary", err));
            None
        }
    };

    stages.push(
        crate::images::extract_images(input, &config.image_dir)
            .await
            .unwrap_or_else(|err| StageReport::aborted("images", err)),
    );

    for stage in &stages {
        log::info!("{}", stage);
    }

    Ok(Outcome { summary, stages })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    use super::*;
    use crate::summarizer::tests::FlakySummarizer;

    fn show(font: &str, size: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), Object::Integer(size)]),
            Operation::new("Td", vec![Object::Integer(72), Object::Integer(y)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    /// Two pages: a title page with an image, and a numbered section. A
    /// third page is blank.
    fn write_sample_pdf(path: &Path) {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica-Bold",
        });
        let image = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject", "Subtype" => "Image",
                "Width" => 2, "Height" => 1,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8,
            },
            vec![0, 255],
        ));

        let mut first = show("F2", 24, 780, "Relatorio Anual");
        first.extend(show("F1", 12, 740, "Os dados do relatorio mostram crescimento"));
        first.extend(show("F1", 12, 726, "e os dados confirmam o relatorio anterior"));
        let mut second = show("F1", 12, 780, "2.1 Metodologia");
        second.extend(show("F1", 12, 740, "Coletamos dados durante o ano inteiro"));

        let mut kids = Vec::new();
        for (operations, with_image) in [(first, true), (second, false), (vec![], false)] {
            let content = Content { operations }.encode().unwrap();
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let mut resources = dictionary! {
                "Font" => dictionary! { "F1" => regular, "F2" => bold },
            };
            if with_image {
                resources.set("XObject", dictionary! { "Im0" => image });
            }
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages", "Kids" => kids, "Count" => 3,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn config(root: &Path) -> Config {
        Config {
            ollama_url: "http://localhost:11434".to_string(),
            model: "test".to_string(),
            report_dir: root.join("utils"),
            image_dir: root.join("images"),
            log_file: root.join("utils").join("shared_log_file.log"),
            summary: RetryPolicy {
                timeout: Duration::from_secs(5),
                attempts: 2,
            },
            verbose: false,
        }
    }

    fn sample(root: &Path) -> PathBuf {
        let input = root.join("Relatorio Anual.pdf");
        write_sample_pdf(&input);
        input
    }

    #[tokio::test]
    async fn test_full_run_writes_report_and_images() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample(dir.path());
        let config = config(dir.path());
        let summarizer = FlakySummarizer::new(0, "<think>hmm</think>Resumo do documento.");

        let outcome = run(&config, &input, Some(&summarizer)).await.unwrap();

        // Two pages with text plus the global summary; the blank page is skipped.
        assert_eq!(summarizer.calls.get(), 3);
        assert_eq!(outcome.summary.as_deref(), Some("Resumo do documento."));
        assert!(outcome.stages.iter().all(|s| s.failures.is_empty()));

        let report =
            std::fs::read_to_string(dir.path().join("utils/relatorio-Relatorio Anual.md")).unwrap();
        assert!(report.starts_with("## Análise do Arquivo ##\n"));
        assert!(report.contains("- **Nome do arquivo:** `Relatorio Anual.pdf`\n"));
        assert!(report.contains("- **Número de páginas:** 3\n"));
        assert!(report.contains("`relatorio` (3), `dados` (3)"));
        assert!(report.contains("- **[Página 1]** Relatorio Anual\n"));
        assert!(report.contains("- **[Página 2]** 2.1 Metodologia\n"));
        assert!(report.ends_with("## Resumo do Arquivo ##\nResumo do documento.\n"));

        let analysis_at = report.find("## Análise").unwrap();
        let structure_at = report.find("## Estrutura Detectada").unwrap();
        let summary_at = report.find("## Resumo do Arquivo").unwrap();
        assert!(analysis_at < structure_at && structure_at < summary_at);

        let image = dir.path().join("images/Relatorio Anual/image_0_0.png");
        assert!(std::fs::read(image).unwrap().starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn test_failing_model_leaves_blank_summary() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample(dir.path());
        let summarizer = FlakySummarizer::new(u32::MAX, "never");

        let outcome = run(&config(dir.path()), &input, Some(&summarizer)).await.unwrap();

        assert_eq!(outcome.summary.as_deref(), Some(""));
        let summary_stage = outcome.stages.iter().find(|s| s.stage == "summary").unwrap();
        assert_eq!(summary_stage.failures.len(), 2);
        let report =
            std::fs::read_to_string(dir.path().join("utils/relatorio-Relatorio Anual.md")).unwrap();
        assert!(report.ends_with("## Resumo do Arquivo ##\n\n"));
    }

    #[tokio::test]
    async fn test_missing_input_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing.pdf");

        let outcome = run::<FlakySummarizer>(&config(dir.path()), &input, None)
            .await
            .unwrap();

        assert!(outcome.summary.is_some_and(|s| s.is_empty()));
        assert!(outcome.stages.iter().all(|s| !s.failures.is_empty()));
        let report = std::fs::read_to_string(dir.path().join("utils/relatorio-missing.md")).unwrap();
        assert!(!report.contains("## Análise do Arquivo ##"));
    }

    #[tokio::test]
    async fn test_uncreatable_report_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample(dir.path());
        std::fs::write(dir.path().join("utils"), "").unwrap();

        let result = run::<FlakySummarizer>(&config(dir.path()), &input, None).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_stage_report_display() {
        let mut stage = StageReport::new("images");
        stage.succeed();
        stage.succeed();
        stage.fail("image_1_0.png", Error::Extraction("bad stream".to_string()));
        assert_eq!(stage.to_string(), "images: 2 succeeded, 1 failed");
    }
}
