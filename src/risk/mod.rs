//! Risk levels, assessments and the classifier adapter.

pub mod assessment;
pub mod classifier;

pub use assessment::{RiskAssessment, RiskLevel};
pub use classifier::{
    ClassificationRequest, ClassifierAdapter, ClassifierResponse, HttpRiskClassifier,
    RiskClassifier,
};
