use crate::infra::load_scorer;
use cardio_advisor::assessment::{
    batch, derive_recommendations, BatchRow, FeatureName, FeatureVector, FieldViolation,
    RiskTier, Scorer,
};
use cardio_advisor::config::AppConfig;
use cardio_advisor::error::AppError;
use clap::Args;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct AssessArgs {
    /// Age in years
    #[arg(long)]
    pub(crate) age: Option<f64>,
    /// Sex (1 = male, 0 = female)
    #[arg(long)]
    pub(crate) sex: Option<f64>,
    /// Chest pain type (0-3)
    #[arg(long)]
    pub(crate) cp: Option<f64>,
    /// Resting blood pressure (mm Hg)
    #[arg(long)]
    pub(crate) trestbps: Option<f64>,
    /// Serum cholesterol (mg/dl)
    #[arg(long)]
    pub(crate) chol: Option<f64>,
    /// Fasting blood sugar above 120 mg/dl (1 = true)
    #[arg(long)]
    pub(crate) fbs: Option<f64>,
    /// Resting ECG result (0-2)
    #[arg(long)]
    pub(crate) restecg: Option<f64>,
    /// Maximum heart rate achieved
    #[arg(long)]
    pub(crate) thalach: Option<f64>,
    /// Exercise induced angina (1 = yes)
    #[arg(long)]
    pub(crate) exang: Option<f64>,
    /// ST depression induced by exercise
    #[arg(long)]
    pub(crate) oldpeak: Option<f64>,
    /// Slope of the peak exercise ST segment (0-2)
    #[arg(long)]
    pub(crate) slope: Option<f64>,
    /// Major vessels coloured by fluoroscopy (0-3)
    #[arg(long)]
    pub(crate) ca: Option<f64>,
    /// Thalassemia code
    #[arg(long)]
    pub(crate) thal: Option<f64>,
    /// Use this probability instead of scoring with the model
    #[arg(long)]
    pub(crate) probability: Option<f64>,
    /// Influential feature name, most important first (repeatable)
    #[arg(long = "top-feature")]
    pub(crate) top_features: Vec<String>,
}

impl AssessArgs {
    fn features(&self) -> FeatureVector {
        FeatureVector {
            age: self.age,
            sex: self.sex,
            cp: self.cp,
            trestbps: self.trestbps,
            chol: self.chol,
            fbs: self.fbs,
            restecg: self.restecg,
            thalach: self.thalach,
            exang: self.exang,
            oldpeak: self.oldpeak,
            slope: self.slope,
            ca: self.ca,
            thal: self.thal,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// CSV file with one patient per row and feature names as headers
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Only assess the first N rows
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

/// How a probability was obtained for one assessment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProbabilitySource {
    Provided(f64),
    Model(f64),
    Incomplete,
    OutOfRange(Vec<FieldViolation>),
}

impl ProbabilitySource {
    fn probability(&self) -> Option<f64> {
        match self {
            ProbabilitySource::Provided(p) | ProbabilitySource::Model(p) => Some(*p),
            ProbabilitySource::Incomplete | ProbabilitySource::OutOfRange(_) => None,
        }
    }
}

pub(crate) fn run_assess(args: AssessArgs) -> Result<(), AppError> {
    let features = args.features();
    let source = match args.probability {
        Some(probability) => ProbabilitySource::Provided(probability),
        None if features.complete().is_some() => {
            let config = AppConfig::load()?;
            let scorer = load_scorer(&config.model)?;
            score_features(&scorer, &features)?
        }
        None => ProbabilitySource::Incomplete,
    };

    print!(
        "{}",
        render_assessment(&features, &source, &args.top_features)
    );
    Ok(())
}

pub(crate) fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let mut rows = batch::read_path(&args.csv)?;
    if let Some(limit) = args.limit {
        rows.truncate(limit);
    }

    let config = AppConfig::load()?;
    let scorer = load_scorer(&config.model)?;

    let mut tiers: BTreeMap<&'static str, usize> = BTreeMap::new();
    println!(
        "Batch assessment of {} row(s) from {}",
        rows.len(),
        args.csv.display()
    );
    for BatchRow { row, features } in rows {
        let source = score_features(&scorer, &features)?;
        let bucket = source
            .probability()
            .map(|p| RiskTier::from_probability(p).label())
            .unwrap_or("unscored");
        *tiers.entry(bucket).or_default() += 1;

        println!("\n# Row {row}");
        print!("{}", render_assessment(&features, &source, &[]));
    }

    println!("\nSummary");
    for (tier, count) in tiers {
        println!("  {tier:<9} {count}");
    }
    Ok(())
}

pub(crate) fn score_features(
    scorer: &dyn Scorer,
    features: &FeatureVector,
) -> Result<ProbabilitySource, AppError> {
    let Some(complete) = features.complete() else {
        return Ok(ProbabilitySource::Incomplete);
    };
    if let Err(violations) = complete.validate() {
        return Ok(ProbabilitySource::OutOfRange(violations));
    }
    Ok(ProbabilitySource::Model(scorer.score(&complete)?))
}

pub(crate) fn render_assessment(
    features: &FeatureVector,
    source: &ProbabilitySource,
    top_features: &[String],
) -> String {
    let mut out = String::new();

    let provided: Vec<String> = FeatureName::ALL
        .into_iter()
        .filter_map(|name| features.get(name).map(|value| format!("{name}={value}")))
        .collect();
    let _ = writeln!(
        out,
        "Features: {}",
        if provided.is_empty() {
            "none".to_string()
        } else {
            provided.join(", ")
        }
    );

    match source {
        ProbabilitySource::Provided(p) => {
            let _ = writeln!(
                out,
                "Risk tier: {} (probability {p:.3}, provided)",
                RiskTier::from_probability(*p)
            );
        }
        ProbabilitySource::Model(p) => {
            let _ = writeln!(
                out,
                "Risk tier: {} (probability {p:.3}, model)",
                RiskTier::from_probability(*p)
            );
        }
        ProbabilitySource::Incomplete => {
            let _ = writeln!(out, "Risk tier: not scored (incomplete features)");
        }
        ProbabilitySource::OutOfRange(violations) => {
            let _ = writeln!(out, "Risk tier: not scored (features out of range)");
            for violation in violations {
                let _ = writeln!(out, "  ! {violation}");
            }
        }
    }

    let top = (!top_features.is_empty()).then_some(top_features);
    let recommendations = derive_recommendations(features, source.probability(), top);
    if recommendations.is_empty() {
        let _ = writeln!(out, "Recommendations: none");
    } else {
        let _ = writeln!(out, "Recommendations:");
        for (index, line) in recommendations.iter().enumerate() {
            let _ = writeln!(out, "  {}. {line}", index + 1);
        }
    }

    out
}
