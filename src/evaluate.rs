//! Batch evaluation of RFP prompts.
//!
//! `rfp evaluate <csv>` reads one prompt per row, answers each against the
//! index, and records the results:
//!
//! ```text
//! prompt ──▶ (rewrite?) ──▶ QaEngine.answer ──▶ verdict ──▶ response CSV
//!                                                        └─▶ history CSV
//! ```
//!
//! Prompts are processed strictly one after another. A model failure aborts
//! the batch unless `--keep-going` is set, in which case the prompt is
//! skipped and reported. Rows written before an abort stay written; the
//! end-of-session marker is only appended when the batch completes.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::history;
use crate::ingest::{connectors_from_config, ingest_docs};
use crate::llm::create_llm;
use crate::phrase::{rewrite_prompt, LexiconTagger, PosTagger};
use crate::progress::{EvalProgressEvent, EvalProgressReporter, ProgressMode};
use crate::qa::QaEngine;
use crate::verdict::{aggregate, extract, ComplianceScore, Verdict};

/// Read prompts from a CSV file: header skipped, first column only, blank
/// cells dropped.
pub fn read_prompts(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open prompt file {}", path.display()))?;

    let mut prompts = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Malformed CSV row {} in {}", i + 2, path.display()))?;
        let Some(cell) = row.get(0) else { continue };
        let prompt = cell.trim();
        if !prompt.is_empty() {
            prompts.push(prompt.to_string());
        }
    }
    Ok(prompts)
}

/// The question as shown to users and written to the CSV files.
pub fn display_prompt(product: &str, query: &str) -> String {
    format!("Does {} {}?", product, query)
}

/// Sources cell: distinct non-empty source identifiers, sorted, `; `-joined.
fn sources_cell(sources: &[String]) -> String {
    sources
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything a batch needs, passed explicitly.
pub struct EvaluationContext<'a> {
    pub qa: QaEngine<'a>,
    pub tagger: &'a dyn PosTagger,
    pub responses_dir: &'a Path,
    pub history_file: PathBuf,
    pub rewrite_prompts: bool,
    pub keep_going: bool,
    pub reporter: &'a dyn EvalProgressReporter,
}

/// One answered prompt.
#[derive(Debug, Clone)]
pub struct PromptOutcome {
    /// Prompt as read from the CSV.
    pub prompt: String,
    /// Question actually asked (after optional rewriting).
    pub query: String,
    pub display: String,
    pub response: String,
    pub sources: Vec<String>,
    pub verdict: Verdict,
}

/// A prompt skipped under `--keep-going`.
#[derive(Debug, Clone)]
pub struct SkippedPrompt {
    pub prompt: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub response_file: PathBuf,
    pub outcomes: Vec<PromptOutcome>,
    pub skipped: Vec<SkippedPrompt>,
    pub verdicts: Vec<Verdict>,
    pub score: ComplianceScore,
}

/// Answer every prompt in order and persist each row as it completes.
pub async fn run_evaluation(
    ctx: &EvaluationContext<'_>,
    prompts: &[String],
) -> Result<EvaluationReport> {
    let total = prompts.len();
    let response_file = history::create_response_file(ctx.responses_dir, chrono::Local::now())?;
    tracing::info!(prompts = total, file = %response_file.display(), "evaluation started");
    ctx.reporter.report(EvalProgressEvent::Started { total });

    let mut outcomes = Vec::with_capacity(total);
    let mut skipped = Vec::new();

    for (i, prompt) in prompts.iter().enumerate() {
        let n = i + 1;
        let query = if ctx.rewrite_prompts {
            rewrite_prompt(ctx.tagger, prompt)
        } else {
            prompt.clone()
        };

        let answer = match ctx.qa.answer(&query).await {
            Ok(answer) => answer,
            Err(e) if ctx.keep_going => {
                tracing::warn!(n, prompt = %prompt, error = %e, "prompt skipped");
                ctx.reporter.report(EvalProgressEvent::Skipped {
                    n,
                    total,
                    prompt: prompt.clone(),
                    error: e.to_string(),
                });
                skipped.push(SkippedPrompt {
                    prompt: prompt.clone(),
                    error: format!("{:#}", e),
                });
                continue;
            }
            Err(e) => {
                return Err(e.context(format!("Prompt {} of {} failed: {}", n, total, prompt)));
            }
        };

        let sources: Vec<String> = answer.sources().into_iter().collect();
        let verdict = extract(&answer.result);
        let display = display_prompt(ctx.qa.product, &answer.query);
        let cell = sources_cell(&sources);

        let row = [display.as_str(), answer.result.as_str(), cell.as_str()];
        history::append_row(&response_file, &row)?;
        history::append_history_row(&ctx.history_file, &row)?;

        tracing::debug!(n, verdict = %verdict, sources = sources.len(), "prompt answered");
        ctx.reporter.report(EvalProgressEvent::Answered {
            n,
            total,
            prompt: prompt.clone(),
            verdict,
        });

        outcomes.push(PromptOutcome {
            prompt: prompt.clone(),
            query: answer.query,
            display,
            response: answer.result,
            sources,
            verdict,
        });
    }

    history::append_session_end(&ctx.history_file, chrono::Local::now())?;

    let verdicts: Vec<Verdict> = outcomes.iter().map(|o| o.verdict).collect();
    let score = aggregate(&verdicts);
    tracing::info!(
        answered = outcomes.len(),
        skipped = skipped.len(),
        score = score.percentage,
        "evaluation finished"
    );

    Ok(EvaluationReport {
        response_file,
        outcomes,
        skipped,
        verdicts,
        score,
    })
}

/// CLI entry point for `rfp evaluate`.
pub async fn run_evaluate(
    config: &Config,
    csv_path: &Path,
    keep_going: bool,
    progress: ProgressMode,
) -> Result<()> {
    let prompts = read_prompts(csv_path)?;
    if prompts.is_empty() {
        anyhow::bail!("No prompts found in {}", csv_path.display());
    }

    let llm = create_llm(&config.llm)?;
    let embedder = create_embedder(&config.embedding)?;
    let (manual, requirements) = connectors_from_config(config)?;
    let (index, _) = ingest_docs(config, manual.as_ref(), requirements.as_ref(), embedder.as_ref()).await?;

    let tagger = LexiconTagger::new();
    let reporter = progress.reporter();
    let ctx = EvaluationContext {
        qa: QaEngine {
            index: &index,
            embedder: embedder.as_ref(),
            llm: llm.as_ref(),
            product: &config.product.name,
            retrieval: &config.retrieval,
        },
        tagger: &tagger,
        responses_dir: &config.paths.responses_dir,
        history_file: config.paths.history_file(),
        rewrite_prompts: config.evaluation.rewrite_prompts,
        keep_going,
        reporter: reporter.as_ref(),
    };

    let result = run_evaluation(&ctx, &prompts).await;
    drop(ctx);
    index.close().await;
    let report = result?;

    let unclear = report
        .verdicts
        .iter()
        .filter(|v| **v == Verdict::Unclear)
        .count();

    println!("evaluate");
    println!("  prompts: {}", prompts.len());
    println!("  answered: {}", report.outcomes.len());
    if !report.skipped.is_empty() {
        println!("  skipped: {}", report.skipped.len());
        for s in &report.skipped {
            println!("    - {} ({})", s.prompt, s.error);
        }
    }
    println!(
        "  verdicts: {} yes, {} no, {} n/a",
        report.score.yes_count, report.score.no_count, unclear
    );
    println!(
        "  compliance: {:.2}% ({})",
        report.score.percentage,
        report.score.band()
    );
    println!("  responses: {}", report.response_file.display());
    println!("ok");
    Ok(())
}

/// CLI entry point for `rfp ask`: one prompt, nothing persisted.
pub async fn run_ask(config: &Config, prompt: &str) -> Result<()> {
    let llm = create_llm(&config.llm)?;
    let embedder = create_embedder(&config.embedding)?;
    let (manual, requirements) = connectors_from_config(config)?;
    let (index, _) = ingest_docs(config, manual.as_ref(), requirements.as_ref(), embedder.as_ref()).await?;

    let query = if config.evaluation.rewrite_prompts {
        rewrite_prompt(&LexiconTagger::new(), prompt)
    } else {
        prompt.to_string()
    };

    let qa = QaEngine {
        index: &index,
        embedder: embedder.as_ref(),
        llm: llm.as_ref(),
        product: &config.product.name,
        retrieval: &config.retrieval,
    };
    let result = qa.answer(&query).await;
    index.close().await;
    let answer = result?;

    println!("{}", display_prompt(&config.product.name, &answer.query));
    println!();
    println!("{}", answer.result);
    println!();
    println!("verdict: {}", extract(&answer.result));
    let sources = answer.sources();
    if !sources.is_empty() {
        println!("sources:");
        for source in sources.iter().filter(|s| !s.is_empty()) {
            println!("  {}", source);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn prompts_first_column_header_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rfps.csv");
        std::fs::write(
            &path,
            "Requirement,\nsupport single sign-on,\n  ,\nexport reports to PDF,extra\n\"track parts, tools\",\n",
        )
        .unwrap();

        let prompts = read_prompts(&path).unwrap();
        assert_eq!(
            prompts,
            vec![
                "support single sign-on",
                "export reports to PDF",
                "track parts, tools"
            ]
        );
    }

    #[test]
    fn missing_prompt_file() {
        let tmp = TempDir::new().unwrap();
        assert!(read_prompts(&tmp.path().join("none.csv")).is_err());
    }

    #[test]
    fn display_form() {
        assert_eq!(
            display_prompt("ION", "support single sign-on"),
            "Does ION support single sign-on?"
        );
    }

    #[test]
    fn sources_cell_drops_blank() {
        let sources = vec![
            String::new(),
            "https://d/a".to_string(),
            "https://d/b".to_string(),
        ];
        assert_eq!(sources_cell(&sources), "https://d/a; https://d/b");
        assert_eq!(sources_cell(&[]), "");
    }
}
