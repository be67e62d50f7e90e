use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tdval::{
    CalibrationStatus,
    EngineId,
    InputMap,
    ProteinMap,
    PsmMap,
    ScoreDirection,
    TargetDecoyMap,
    TargetDecoyResults,
    Validation,
    fuse_error_probabilities,
};
use tracing::{
    debug,
    info,
    warn,
};

use crate::config::{
    AnalysisConfig,
    OutputConfig,
};
use crate::errors::CliError;

/// One row of the input CSV, a single search engine hit.
#[derive(Debug, Clone, Deserialize)]
pub struct HitRecord {
    pub psm_id: String,
    pub engine: EngineId,
    pub score: f64,
    pub is_decoy: bool,
    #[serde(default)]
    pub charge: Option<u8>,
    #[serde(default)]
    pub protein: Option<String>,
}

#[derive(Debug, Serialize)]
struct PsmRow<'a> {
    psm_id: &'a str,
    charge: u8,
    is_decoy: bool,
    n_engines: usize,
    score: f64,
    pep: f64,
    confidence: f64,
    validated: bool,
}

#[derive(Debug, Serialize)]
struct ProteinRow<'a> {
    protein: &'a str,
    is_decoy: bool,
    n_psms: usize,
    score: f64,
    pep: f64,
    confidence: f64,
    validated: bool,
}

#[derive(Debug, Serialize)]
struct EngineSummary {
    engine: EngineId,
    n_targets: usize,
    n_decoys: usize,
    separation_auc: Option<f64>,
    suspicious: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    engines: Vec<EngineSummary>,
    multiple_search_engines: bool,
    pooled_charges: Vec<u8>,
    psms: TargetDecoyResults,
    proteins: Option<TargetDecoyResults>,
}

struct Psm<'a> {
    id: &'a str,
    charge: u8,
    is_decoy: bool,
    n_engines: usize,
    score: f64,
    protein: Option<&'a str>,
}

fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner:.green} {msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    let bar = ProgressBar::new(len).with_style(style);
    bar.set_message(message);
    bar
}

pub fn read_hits(path: &Path) -> Result<Vec<HitRecord>, CliError> {
    let st = Instant::now();
    let mut reader = csv::Reader::from_path(path)?;
    let hits = reader
        .deserialize()
        .collect::<Result<Vec<HitRecord>, csv::Error>>()?;
    info!(
        "Read {} hits from {} in {:?}",
        hits.len(),
        path.display(),
        st.elapsed()
    );
    Ok(hits)
}

fn build_input_map(hits: &[HitRecord], analysis: &AnalysisConfig) -> Result<InputMap, CliError> {
    let mut input = InputMap::with_params(analysis.engine_direction, analysis.calibration);
    for (engine, direction) in analysis.engine_directions.iter() {
        input.set_engine_direction(*engine, *direction);
    }
    for hit in hits {
        input
            .add_entry(hit.engine, hit.score, hit.is_decoy)
            .map_err(|e| e.append_to_context(&format!(", PSM {}", hit.psm_id)))?;
    }
    Ok(input)
}

fn check_status(status: CalibrationStatus, what: &str) -> Result<(), CliError> {
    match status {
        CalibrationStatus::Completed => Ok(()),
        CalibrationStatus::Cancelled => Err(CliError::Data {
            source: format!("Calibration of the {} was cancelled", what),
        }),
    }
}

pub fn run(
    hits: Vec<HitRecord>,
    analysis: &AnalysisConfig,
    output: &OutputConfig,
) -> Result<(), CliError> {
    let start = Instant::now();
    let validation = Validation::from_confidence(analysis.min_confidence)?;

    // Search engine level
    let mut input = build_input_map(&hits, analysis)?;
    let bar = progress_bar(input.total_observations() as u64, "engines");
    let status = if analysis.parallel {
        input.estimate_probabilities_parallel(&bar)
    } else {
        input.estimate_probabilities(&bar)
    };
    bar.finish();
    check_status(status, "search engines")?;

    let suspicious = input.suspicious_input();
    for engine in suspicious.iter() {
        warn!(
            "Search engine {} has too few or non-discriminative hits, its probabilities may be unreliable",
            engine
        );
    }
    let engines: Vec<EngineSummary> = input
        .engine_ids()
        .filter_map(|engine| input.get_map(engine).map(|map| (engine, map)))
        .map(|(engine, map)| EngineSummary {
            engine,
            n_targets: map.n_targets(),
            n_decoys: map.n_decoys(),
            separation_auc: map.separation_auc(),
            suspicious: suspicious.contains(&engine),
        })
        .collect();

    // PSM level
    let mut grouped: BTreeMap<&str, Vec<&HitRecord>> = BTreeMap::new();
    for hit in hits.iter() {
        grouped.entry(hit.psm_id.as_str()).or_default().push(hit);
    }
    let mut psms = Vec::with_capacity(grouped.len());
    for (id, psm_hits) in grouped {
        let engine_hits: Vec<(EngineId, f64)> =
            psm_hits.iter().map(|h| (h.engine, h.score)).collect();
        let score = input.psm_score(&engine_hits)?;
        let mut n_engines: Vec<EngineId> = engine_hits.iter().map(|h| h.0).collect();
        n_engines.sort_unstable();
        n_engines.dedup();
        psms.push(Psm {
            id,
            charge: psm_hits.iter().find_map(|h| h.charge).unwrap_or(0),
            is_decoy: psm_hits.iter().any(|h| h.is_decoy),
            n_engines: n_engines.len(),
            score,
            protein: psm_hits.iter().find_map(|h| h.protein.as_deref()),
        });
    }
    debug!("Built {} PSMs from {} hits", psms.len(), hits.len());

    let mut psm_map = PsmMap::with_params(input.psm_score_direction(), analysis.calibration);
    for psm in psms.iter() {
        psm_map.add_point(psm.charge, psm.score, psm.is_decoy)?;
    }
    let pooled_charges = psm_map.merge_sparse_groups(analysis.min_group_size);
    if !pooled_charges.is_empty() {
        info!("Pooled sparse charge states {:?}", pooled_charges);
    }
    let bar = progress_bar(psm_map.get_map_size() as u64, "PSMs");
    let status = psm_map.estimate_probabilities(&bar);
    bar.finish();
    check_status(status, "PSMs")?;

    let mut psm_peps = Vec::with_capacity(psms.len());
    for psm in psms.iter() {
        psm_peps.push(psm_map.get_probability(&psm.charge, psm.score)?);
    }

    // Whole PSM level, independent of charge, for the FDR summary
    let mut all_psms =
        TargetDecoyMap::with_params(input.psm_score_direction(), analysis.calibration);
    for psm in psms.iter() {
        all_psms.put(psm.score, psm.is_decoy)?;
    }
    let psm_results = all_psms.target_decoy_results(analysis.fdr_limit)?;
    info!(
        "{} of {} target PSMs pass {} FDR",
        psm_results.n_validated, psm_results.n_targets, analysis.fdr_limit
    );

    // Protein level
    let mut protein_scores: BTreeMap<&str, (Vec<f64>, bool)> = BTreeMap::new();
    for (psm, pep) in psms.iter().zip(psm_peps.iter()) {
        if let Some(protein) = psm.protein {
            let entry = protein_scores.entry(protein).or_insert((Vec::new(), false));
            entry.0.push(*pep);
            entry.1 |= psm.is_decoy;
        }
    }
    let mut protein_rows = Vec::with_capacity(protein_scores.len());
    let protein_results = if protein_scores.is_empty() {
        None
    } else {
        let mut proteins =
            ProteinMap::with_params(ScoreDirection::LowerIsBetter, analysis.calibration);
        let fused: Vec<(&str, f64, bool, usize)> = protein_scores
            .iter()
            .map(|(protein, (peps, is_decoy))| {
                (
                    *protein,
                    fuse_error_probabilities(peps.iter().copied()),
                    *is_decoy,
                    peps.len(),
                )
            })
            .collect();
        for (_, score, is_decoy, _) in fused.iter() {
            proteins.add_point(*score, *is_decoy)?;
        }
        if proteins.suspicious_input() {
            warn!("Protein level scores look unreliable, check the decoy database");
        }
        let bar = progress_bar(proteins.get_map_size() as u64, "proteins");
        let status = proteins.estimate_probabilities(&bar);
        bar.finish();
        check_status(status, "proteins")?;

        for (protein, score, is_decoy, n_psms) in fused {
            let quality = validation.assess(proteins.get_probability(score)?);
            protein_rows.push(ProteinRow {
                protein,
                is_decoy,
                n_psms,
                score,
                pep: quality.pep,
                confidence: quality.confidence,
                validated: quality.validated,
            });
        }
        Some(proteins.target_decoy_results(analysis.fdr_limit)?)
    };

    write_psms(&output.directory.join("psms.csv"), &psms, &psm_peps, &validation)?;
    if !protein_rows.is_empty() {
        write_rows(&output.directory.join("proteins.csv"), &protein_rows)?;
    }
    for engine in input.engine_ids() {
        if let Some(map) = input.get_map(engine) {
            let path = output.directory.join(format!("engine_{}.json", engine));
            let file = std::fs::File::create(&path).map_err(|e| CliError::io(e, &path))?;
            map.snapshot().to_writer(std::io::BufWriter::new(file))?;
        }
    }

    let summary = Summary {
        engines,
        multiple_search_engines: input.is_multiple_search_engines(),
        pooled_charges,
        psms: psm_results,
        proteins: protein_results,
    };
    let summary_path = output.directory.join("summary.json");
    let file = std::fs::File::create(&summary_path).map_err(|e| CliError::io(e, &summary_path))?;
    serde_json::to_writer_pretty(file, &summary)?;

    info!(
        "Processed {} hits into {} PSMs in {:?}",
        hits.len(),
        psms.len(),
        start.elapsed()
    );
    Ok(())
}

fn write_psms(
    path: &Path,
    psms: &[Psm<'_>],
    peps: &[f64],
    validation: &Validation,
) -> Result<(), CliError> {
    let rows: Vec<PsmRow<'_>> = psms
        .iter()
        .zip(peps.iter())
        .map(|(psm, pep)| {
            let quality = validation.assess(*pep);
            PsmRow {
                psm_id: psm.id,
                charge: psm.charge,
                is_decoy: psm.is_decoy,
                n_engines: psm.n_engines,
                score: psm.score,
                pep: quality.pep,
                confidence: quality.confidence,
                validated: quality.validated,
            }
        })
        .collect();
    write_rows(path, &rows)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| CliError::io(e, path))?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_hits(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("hits.csv");
        let mut writer = csv::Writer::from_path(&path).unwrap();
        writer
            .write_record(["psm_id", "engine", "score", "is_decoy", "charge", "protein"])
            .unwrap();
        for i in 0..150 {
            let target_ev = format!("{:e}", 10f64.powf(-6.0 - (i % 30) as f64 / 10.0));
            let decoy_ev = format!("{:e}", 10f64.powf(-(i % 40) as f64 / 10.0));
            let (charge, decoy_charge) = if i % 50 == 0 { ("4", "") } else { ("2", "2") };
            let target_id = format!("t{}", i);
            let decoy_id = format!("d{}", i);
            let target_protein = format!("P{}", i % 60);
            let decoy_protein = format!("DECOY_P{}", i % 60);
            for engine in ["0", "1"] {
                writer
                    .write_record([
                        target_id.as_str(),
                        engine,
                        target_ev.as_str(),
                        "false",
                        charge,
                        target_protein.as_str(),
                    ])
                    .unwrap();
                writer
                    .write_record([
                        decoy_id.as_str(),
                        engine,
                        decoy_ev.as_str(),
                        "true",
                        decoy_charge,
                        decoy_protein.as_str(),
                    ])
                    .unwrap();
            }
        }
        writer.flush().unwrap();
        path
    }

    #[test]
    fn test_full_run() {
        let dir = std::env::temp_dir().join("tdval_cli_test_full_run");
        if dir.exists() {
            std::fs::remove_dir_all(&dir).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        let hits = read_hits(&write_hits(&dir)).unwrap();
        assert_eq!(hits.len(), 600);
        assert_eq!(hits[1].charge, None);

        let output = OutputConfig {
            directory: dir.clone(),
        };
        run(hits, &AnalysisConfig::default(), &output).unwrap();

        for name in ["psms.csv", "proteins.csv", "summary.json", "engine_0.json", "engine_1.json"] {
            assert!(dir.join(name).exists(), "missing output {}", name);
        }
        let summary: serde_json::Value =
            serde_json::from_reader(std::fs::File::open(dir.join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(summary["multiple_search_engines"], true);
        assert_eq!(summary["engines"].as_array().unwrap().len(), 2);
        assert!(summary["psms"]["n_validated"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_bad_score_is_reported() {
        let dir = std::env::temp_dir().join("tdval_cli_test_bad_score");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hits.csv");
        std::fs::write(&path, "psm_id,engine,score,is_decoy\na,0,NaN,false\n").unwrap();
        let hits = read_hits(&path).unwrap();
        let output = OutputConfig { directory: dir };
        let err = run(hits, &AnalysisConfig::default(), &output).unwrap_err();
        assert!(matches!(err, CliError::Data { .. }), "{:?}", err);
    }
}
