use serde::{Deserialize, Serialize};

use super::super::domain::FeatureVector;

/// Clinical area a rule belongs to. Groups are evaluated in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceGroup {
    LipidGlucose,
    BloodPressureExertion,
    EcgStSegment,
    VascularThal,
    DemographicSymptom,
}

/// Advisory that a single rule can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advice {
    HighCholesterol,
    BorderlineCholesterol,
    HighFastingGlucose,
    Hypertension,
    ElevatedBloodPressure,
    LowExerciseCapacity,
    ExertionalAngina,
    HighStDepression,
    ModerateStDepression,
    DownslopingSt,
    AbnormalRestingEcg,
    VesselInvolvement,
    AbnormalThal,
    AgeOver55,
    MaleOver45,
    ChestPainSymptoms,
}

impl Advice {
    pub const fn text(self) -> &'static str {
        match self {
            Advice::HighCholesterol => {
                "High cholesterol: cut saturated fat and fried food; eat more fish, nuts and at least 400 g of vegetables a day."
            }
            Advice::BorderlineCholesterol => {
                "Borderline-high cholesterol: follow a DASH or Mediterranean diet and monitor regularly."
            }
            Advice::HighFastingGlucose => {
                "High fasting blood sugar: limit refined sugar, eat more fibre, and exercise 150 minutes a week."
            }
            Advice::Hypertension => {
                "High blood pressure: keep salt under 5 g a day, walk briskly 30 minutes a day, and manage stress."
            }
            Advice::ElevatedBloodPressure => {
                "Mildly elevated blood pressure: stay active, limit alcohol, and keep monitoring."
            }
            Advice::LowExerciseCapacity => {
                "Low exercise capacity (max heart rate under 120): start light-to-moderate exercise 20-30 minutes, 5 days a week."
            }
            Advice::ExertionalAngina => {
                "Chest pain on exertion: keep exercise light and stop if pain or shortness of breath appears."
            }
            Advice::HighStDepression => {
                "ST depression above 2: reduce stress, sleep 7-8 hours, and consult a doctor."
            }
            Advice::ModerateStDepression => {
                "ST depression between 1 and 2: moderate training intensity and watch for symptoms."
            }
            Advice::DownslopingSt => {
                "Downsloping ST segment: be careful with exertion and prefer steady, rhythmic exercise."
            }
            Advice::AbnormalRestingEcg => {
                "Abnormal resting ECG: avoid sudden increases in exertion and watch for symptoms."
            }
            Advice::VesselInvolvement => {
                "Signs of vessel involvement (ca of 1 or more): tighten lifestyle habits and monitor blood pressure and lipids."
            }
            Advice::AbnormalThal => {
                "Abnormal thalassemia result (6/7): keep exercise light-to-moderate and watch for fatigue or shortness of breath."
            }
            Advice::AgeOver55 => {
                "Age 55 or over: eat well, exercise regularly, and have a check-up every 6-12 months."
            }
            Advice::MaleOver45 => {
                "Male aged 45 or over: control waist size, limit alcohol, and monitor lipids."
            }
            Advice::ChestPainSymptoms => {
                "Chest pain symptoms reported: if pain spreads to the arm or jaw, or breathing is difficult, seek care immediately."
            }
        }
    }

    pub const fn group(self) -> AdviceGroup {
        match self {
            Advice::HighCholesterol | Advice::BorderlineCholesterol | Advice::HighFastingGlucose => {
                AdviceGroup::LipidGlucose
            }
            Advice::Hypertension
            | Advice::ElevatedBloodPressure
            | Advice::LowExerciseCapacity
            | Advice::ExertionalAngina => AdviceGroup::BloodPressureExertion,
            Advice::HighStDepression
            | Advice::ModerateStDepression
            | Advice::DownslopingSt
            | Advice::AbnormalRestingEcg => AdviceGroup::EcgStSegment,
            Advice::VesselInvolvement | Advice::AbnormalThal => AdviceGroup::VascularThal,
            Advice::AgeOver55 | Advice::MaleOver45 | Advice::ChestPainSymptoms => {
                AdviceGroup::DemographicSymptom
            }
        }
    }
}

/// Predicate paired with the advisory it produces.
pub(crate) struct Rule {
    pub(crate) advice: Advice,
    pub(crate) fires: fn(&FeatureVector) -> bool,
}

/// Entry of the rule table.
pub(crate) enum RuleEntry {
    Single(Rule),
    /// Severity ladder: the first rule that fires wins, the rest are skipped.
    FirstMatch(&'static [Rule]),
}

fn at_least(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v >= threshold)
}

fn above(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v > threshold)
}

fn below(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v < threshold)
}

fn equals(value: Option<f64>, expected: f64) -> bool {
    value == Some(expected)
}

fn one_of(value: Option<f64>, expected: &[f64]) -> bool {
    value.is_some_and(|v| expected.contains(&v))
}

const CHOLESTEROL_LADDER: &[Rule] = &[
    Rule {
        advice: Advice::HighCholesterol,
        fires: |x| at_least(x.chol, 240.0),
    },
    Rule {
        advice: Advice::BorderlineCholesterol,
        fires: |x| at_least(x.chol, 200.0),
    },
];

const BLOOD_PRESSURE_LADDER: &[Rule] = &[
    Rule {
        advice: Advice::Hypertension,
        fires: |x| at_least(x.trestbps, 140.0),
    },
    Rule {
        advice: Advice::ElevatedBloodPressure,
        fires: |x| at_least(x.trestbps, 130.0),
    },
];

const ST_DEPRESSION_LADDER: &[Rule] = &[
    Rule {
        advice: Advice::HighStDepression,
        fires: |x| above(x.oldpeak, 2.0),
    },
    Rule {
        advice: Advice::ModerateStDepression,
        fires: |x| above(x.oldpeak, 1.0),
    },
];

pub(crate) const RULES: &[RuleEntry] = &[
    RuleEntry::FirstMatch(CHOLESTEROL_LADDER),
    RuleEntry::Single(Rule {
        advice: Advice::HighFastingGlucose,
        fires: |x| equals(x.fbs, 1.0),
    }),
    RuleEntry::FirstMatch(BLOOD_PRESSURE_LADDER),
    RuleEntry::Single(Rule {
        advice: Advice::LowExerciseCapacity,
        fires: |x| below(x.thalach, 120.0),
    }),
    RuleEntry::Single(Rule {
        advice: Advice::ExertionalAngina,
        fires: |x| equals(x.exang, 1.0),
    }),
    RuleEntry::FirstMatch(ST_DEPRESSION_LADDER),
    RuleEntry::Single(Rule {
        advice: Advice::DownslopingSt,
        fires: |x| equals(x.slope, 2.0),
    }),
    RuleEntry::Single(Rule {
        advice: Advice::AbnormalRestingEcg,
        fires: |x| x.restecg.is_some_and(|v| v != 0.0),
    }),
    RuleEntry::Single(Rule {
        advice: Advice::VesselInvolvement,
        fires: |x| at_least(x.ca, 1.0),
    }),
    RuleEntry::Single(Rule {
        advice: Advice::AbnormalThal,
        fires: |x| one_of(x.thal, &[6.0, 7.0]),
    }),
    RuleEntry::Single(Rule {
        advice: Advice::AgeOver55,
        fires: |x| at_least(x.age, 55.0),
    }),
    // A missing age counts as 0 here, so the rule stays silent without it.
    RuleEntry::Single(Rule {
        advice: Advice::MaleOver45,
        fires: |x| equals(x.sex, 1.0) && x.age.unwrap_or(0.0) >= 45.0,
    }),
    RuleEntry::Single(Rule {
        advice: Advice::ChestPainSymptoms,
        fires: |x| one_of(x.cp, &[0.0, 1.0]),
    }),
];

impl RuleEntry {
    fn evaluate(&self, features: &FeatureVector) -> Option<Advice> {
        match self {
            RuleEntry::Single(rule) => (rule.fires)(features).then_some(rule.advice),
            RuleEntry::FirstMatch(ladder) => ladder
                .iter()
                .find(|rule| (rule.fires)(features))
                .map(|rule| rule.advice),
        }
    }
}

/// Runs the rule table in order, yielding at most one advisory per entry.
pub(crate) fn evaluate_rules(features: &FeatureVector) -> Vec<Advice> {
    RULES
        .iter()
        .filter_map(|entry| entry.evaluate(features))
        .collect()
}
