//! Markdown rendering of the analysis report
//!
//! Each function renders one self-contained block. The shell appends the
//! blocks to the report file in order: file analysis and structure first,
//! then the summary once the model has answered.

use std::fmt::Write;

use pdf::DocumentStructure;

use crate::stats::{CorpusStats, TOP_K};

/// Everything the file-analysis block reports about the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAnalysis {
    pub file_name: String,
    pub page_count: usize,
    pub byte_size: u64,
    pub stats: CorpusStats,
}

const SIZE_UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];

/// Human-readable size with two decimals, e.g. `1.50 KB`.
///
/// A value moves up a unit only while it is strictly greater than 1024, so
/// exactly 1024 bytes stays `1024.00 bytes`.
pub fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size > 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, SIZE_UNITS[unit])
}

fn render_top_words(stats: &CorpusStats) -> String {
    if stats.top_words.is_empty() {
        return "(nenhuma)".to_string();
    }
    stats
        .top_words
        .iter()
        .map(|w| format!("`{}` ({})", w.word, w.count))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_file_analysis(analysis: &FileAnalysis) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "## Análise do Arquivo ##");
    let _ = writeln!(out, "- **Nome do arquivo:** `{}`", analysis.file_name);
    let _ = writeln!(out, "- **Número de páginas:** {}", analysis.page_count);
    let _ = writeln!(out, "- **Número de palavras:** {}", analysis.stats.total_words);
    let _ = writeln!(
        out,
        "- **Tamanho em bytes do arquivo:** `{}` ({})",
        analysis.byte_size,
        format_file_size(analysis.byte_size)
    );
    let _ = writeln!(
        out,
        "- **{} palavras mais comuns e suas frequências:** {}",
        TOP_K,
        render_top_words(&analysis.stats)
    );
    let _ = writeln!(
        out,
        "- **Quantidade de Palavras Distintas(após filtragem):** {}",
        analysis.stats.distinct_words
    );
    out.push('\n');
    out
}

pub fn render_structure(structure: &DocumentStructure) -> String {
    let mut out = String::from("## Estrutura Detectada \n");

    out.push_str("\n### Títulos Detectados ###\n");
    if structure.titles.is_empty() {
        out.push_str("- **Nenhum título detectado.**\n");
    }
    for title in &structure.titles {
        let _ = writeln!(out, "- **[Página {}]** {}", title.page, title.text);
    }

    out.push_str("\n### Seções Detectadas ###\n");
    if structure.sections.is_empty() {
        out.push_str("- **Nenhuma seção detectada.**\n");
    }
    for section in &structure.sections {
        let _ = writeln!(out, "- **[Página {}]** {}", section.page, section.text);
    }

    out.push('\n');
    out
}

pub fn render_summary(summary: &str) -> String {
    format!("## Resumo do Arquivo ##\n{}\n", summary)
}

#[cfg(test)]
mod tests {
    use pdf::Heading;

    use super::*;
    use crate::stats::WordCount;

    fn analysis() -> FileAnalysis {
        FileAnalysis {
            file_name: "relatorio.pdf".to_string(),
            page_count: 3,
            byte_size: 2048,
            stats: CorpusStats {
                total_words: 120,
                distinct_words: 40,
                top_words: vec![
                    WordCount {
                        word: "relatório".to_string(),
                        count: 3,
                    },
                    WordCount {
                        word: "dados".to_string(),
                        count: 2,
                    },
                ],
            },
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0.00 bytes");
        assert_eq!(format_file_size(1024), "1024.00 bytes");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_file_size(3 * 1024u64.pow(5)), "3072.00 TB");
    }

    #[test]
    fn test_render_file_analysis() {
        let out = render_file_analysis(&analysis());
        let expected = "## Análise do Arquivo ##\n\
            - **Nome do arquivo:** `relatorio.pdf`\n\
            - **Número de páginas:** 3\n\
            - **Número de palavras:** 120\n\
            - **Tamanho em bytes do arquivo:** `2048` (2.00 KB)\n\
            - **10 palavras mais comuns e suas frequências:** `relatório` (3), `dados` (2)\n\
            - **Quantidade de Palavras Distintas(após filtragem):** 40\n\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_render_file_analysis_without_words() {
        let mut empty = analysis();
        empty.stats.top_words.clear();
        assert!(render_file_analysis(&empty).contains("frequências:** (nenhuma)\n"));
    }

    #[test]
    fn test_render_structure_placeholders() {
        let out = render_structure(&DocumentStructure::default());
        assert_eq!(
            out,
            "## Estrutura Detectada \n\n\
             ### Títulos Detectados ###\n\
             - **Nenhum título detectado.**\n\n\
             ### Seções Detectadas ###\n\
             - **Nenhuma seção detectada.**\n\n"
        );
    }

    #[test]
    fn test_render_structure_entries() {
        let structure = DocumentStructure {
            titles: vec![Heading {
                page: 1,
                text: "Annual Report 2024".to_string(),
            }],
            sections: vec![
                Heading {
                    page: 2,
                    text: "1. Introdução".to_string(),
                },
                Heading {
                    page: 4,
                    text: "2. Resultados".to_string(),
                },
            ],
        };
        let out = render_structure(&structure);
        assert!(out.contains("### Títulos Detectados ###\n- **[Página 1]** Annual Report 2024\n"));
        assert!(out.contains(
            "### Seções Detectadas ###\n- **[Página 2]** 1. Introdução\n- **[Página 4]** 2. Resultados\n"
        ));
        assert!(!out.contains("Nenhum"));
    }

    #[test]
    fn test_render_summary() {
        assert_eq!(render_summary("Resumo."), "## Resumo do Arquivo ##\nResumo.\n");
        assert_eq!(render_summary(""), "## Resumo do Arquivo ##\n\n");
    }
}
