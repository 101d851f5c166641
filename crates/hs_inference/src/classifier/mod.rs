use hs_core::{Error, Result, Sentiment};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vectorizer::FeatureVector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    /// Largest absolute gradient component accepted as converged
    pub tol: f64,
    pub learning_rate: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            learning_rate: 1.0,
        }
    }
}

/// Training ran out of iterations before the gradient fell under tolerance.
/// The model is still usable.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceWarning {
    pub iterations: usize,
    pub max_gradient: f64,
    pub tol: f64,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "logistic regression did not converge after {} iterations (max |gradient| {:.3e} > tol {:.1e})",
            self.iterations, self.max_gradient, self.tol
        )
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct ClassifierFit {
    pub classifier: FittedClassifier,
    pub convergence: Option<ConvergenceWarning>,
}

/// Multinomial logistic regression with an L2 penalty on the weights.
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: ClassifierConfig,
}

impl LogisticRegression {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Minimizes mean cross-entropy plus `||W||^2 / (2 C n)` by full-batch
    /// gradient descent from zero weights. No randomness is involved.
    pub fn fit(&self, features: &[FeatureVector], labels: &[Sentiment]) -> Result<ClassifierFit> {
        if features.is_empty() {
            return Err(Error::Training("Cannot fit classifier without samples".to_string()));
        }
        if features.len() != labels.len() {
            return Err(Error::Training(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if self.config.c <= 0.0 || self.config.learning_rate <= 0.0 {
            return Err(Error::Config(
                "C and learning_rate must be positive".to_string(),
            ));
        }

        let dim = features[0].dim();
        if let Some(v) = features.iter().find(|v| v.dim() != dim) {
            return Err(Error::Training(format!(
                "Inconsistent feature dimensions: {} and {}",
                dim,
                v.dim()
            )));
        }

        let mut classes: Vec<Sentiment> = labels.to_vec();
        classes.sort();
        classes.dedup();

        let k = classes.len();
        let mut model = FittedClassifier {
            classes: classes.clone(),
            n_features: dim,
            weights: vec![vec![0.0; dim]; k],
            intercepts: vec![0.0; k],
            n_iter: 0,
        };

        if k == 1 {
            tracing::warn!("Only one class ({}) present in training labels", classes[0]);
            return Ok(ClassifierFit {
                classifier: model,
                convergence: None,
            });
        }

        let targets: Vec<usize> = labels
            .iter()
            .map(|label| classes.iter().position(|c| c == label).unwrap_or(0))
            .collect();

        let n = features.len() as f64;
        let lambda = 1.0 / (self.config.c * n);
        let lr = self.config.learning_rate;

        let mut grad_w = vec![vec![0.0; dim]; k];
        let mut grad_b = vec![0.0; k];
        let mut max_gradient = f64::INFINITY;

        for iteration in 0..self.config.max_iter {
            for row in grad_w.iter_mut() {
                row.iter_mut().for_each(|g| *g = 0.0);
            }
            grad_b.iter_mut().for_each(|g| *g = 0.0);

            for (x, &target) in features.iter().zip(targets.iter()) {
                let probs = model.class_probabilities(x);
                for (j, p) in probs.into_iter().enumerate() {
                    let err = if j == target { p - 1.0 } else { p };
                    grad_b[j] += err;
                    for (i, v) in x.iter() {
                        grad_w[j][i] += err * v;
                    }
                }
            }

            max_gradient = 0.0;
            for j in 0..k {
                grad_b[j] /= n;
                max_gradient = f64::max(max_gradient, grad_b[j].abs());
                for (g, w) in grad_w[j].iter_mut().zip(model.weights[j].iter()) {
                    *g = *g / n + lambda * w;
                    max_gradient = f64::max(max_gradient, g.abs());
                }
            }

            if max_gradient <= self.config.tol {
                model.n_iter = iteration;
                tracing::debug!("Classifier converged after {} iterations", iteration);
                return Ok(ClassifierFit {
                    classifier: model,
                    convergence: None,
                });
            }

            for j in 0..k {
                model.intercepts[j] -= lr * grad_b[j];
                for (w, g) in model.weights[j].iter_mut().zip(grad_w[j].iter()) {
                    *w -= lr * g;
                }
            }
        }

        model.n_iter = self.config.max_iter;
        let warning = ConvergenceWarning {
            iterations: self.config.max_iter,
            max_gradient,
            tol: self.config.tol,
        };
        tracing::warn!("ConvergenceWarning: {}", warning);

        Ok(ClassifierFit {
            classifier: model,
            convergence: Some(warning),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedClassifier {
    classes: Vec<Sentiment>,
    n_features: usize,
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
    n_iter: usize,
}

impl FittedClassifier {
    pub fn classes(&self) -> &[Sentiment] {
        &self.classes
    }

    /// Feature width this classifier was trained against.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Checks the internal shape of a (possibly deserialized) model.
    pub fn validate(&self) -> Result<()> {
        let k = self.classes.len();
        if k == 0 {
            return Err(Error::ArtifactCorrupt("classifier has no classes".to_string()));
        }
        if self.weights.len() != k || self.intercepts.len() != k {
            return Err(Error::ArtifactCorrupt(format!(
                "classifier has {} classes but {} weight rows and {} intercepts",
                k,
                self.weights.len(),
                self.intercepts.len()
            )));
        }
        if let Some(row) = self.weights.iter().find(|row| row.len() != self.n_features) {
            return Err(Error::ArtifactCorrupt(format!(
                "weight row of width {} does not match feature width {}",
                row.len(),
                self.n_features
            )));
        }
        Ok(())
    }

    fn scores(&self, x: &FeatureVector) -> Vec<f64> {
        self.weights
            .iter()
            .zip(self.intercepts.iter())
            .map(|(w, b)| b + x.dot(w))
            .collect()
    }

    fn class_probabilities(&self, x: &FeatureVector) -> Vec<f64> {
        let scores = self.scores(x);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    fn check_dim(&self, x: &FeatureVector) -> Result<()> {
        if x.dim() != self.n_features {
            return Err(Error::Scoring(format!(
                "Classifier expects {} features, got a vector of dimension {}",
                self.n_features,
                x.dim()
            )));
        }
        Ok(())
    }

    /// Raw linear scores, one row per input and one column per class.
    pub fn decision_function(&self, features: &[FeatureVector]) -> Result<Vec<Vec<f64>>> {
        features
            .iter()
            .map(|x| {
                self.check_dim(x)?;
                Ok(self.scores(x))
            })
            .collect()
    }

    pub fn predict_proba(&self, features: &[FeatureVector]) -> Result<Vec<Vec<f64>>> {
        features
            .iter()
            .map(|x| {
                self.check_dim(x)?;
                Ok(self.class_probabilities(x))
            })
            .collect()
    }

    /// One label per input. Ties go to the earliest class in canonical order.
    pub fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Sentiment>> {
        features
            .iter()
            .map(|x| {
                self.check_dim(x)?;
                let scores = self.scores(x);
                let mut best = 0;
                for (j, s) in scores.iter().enumerate().skip(1) {
                    if *s > scores[best] {
                        best = j;
                    }
                }
                Ok(self.classes[best])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::TfIdfVectorizer;

    fn training_set() -> (Vec<&'static str>, Vec<Sentiment>) {
        let samples = vec![
            ("profit growth strong", Sentiment::Positive),
            ("record profit", Sentiment::Positive),
            ("strong gains", Sentiment::Positive),
            ("losses deepen", Sentiment::Negative),
            ("crash fears", Sentiment::Negative),
            ("shares plunge losses", Sentiment::Negative),
            ("annual meeting scheduled", Sentiment::Neutral),
            ("board meeting", Sentiment::Neutral),
            ("stable outlook", Sentiment::Neutral),
        ];
        samples.into_iter().unzip()
    }

    #[test]
    fn test_fit_and_predict_separable_data() {
        let (texts, labels) = training_set();
        let (vectorizer, features) = TfIdfVectorizer::default().fit_transform(&texts).unwrap();
        let fit = LogisticRegression::default().fit(&features, &labels).unwrap();

        assert_eq!(fit.classifier.classes(), &Sentiment::ALL);
        let predictions = fit.classifier.predict(&features).unwrap();
        assert_eq!(predictions, labels);

        let unseen = vectorizer.transform(&["strong profit", "crash losses"]);
        let predictions = fit.classifier.predict(&unseen).unwrap();
        assert_eq!(predictions, vec![Sentiment::Positive, Sentiment::Negative]);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let (texts, labels) = training_set();
        let (vectorizer, features) = TfIdfVectorizer::default().fit_transform(&texts).unwrap();
        let model = LogisticRegression::default().fit(&features, &labels).unwrap().classifier;
        let inputs = vectorizer.transform(&["record gains", "meeting", "nothing known"]);
        let first = model.predict(&inputs).unwrap();
        for _ in 0..5 {
            assert_eq!(model.predict(&inputs).unwrap(), first);
        }
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (texts, labels) = training_set();
        let (vectorizer, features) = TfIdfVectorizer::default().fit_transform(&texts).unwrap();
        let model = LogisticRegression::default().fit(&features, &labels).unwrap().classifier;
        for row in model.predict_proba(&vectorizer.transform(&["profit plunge"])).unwrap() {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_exhausted_budget_reports_convergence_warning() {
        let (texts, labels) = training_set();
        let (_, features) = TfIdfVectorizer::default().fit_transform(&texts).unwrap();
        let config = ClassifierConfig {
            max_iter: 2,
            ..Default::default()
        };
        let fit = LogisticRegression::new(config).fit(&features, &labels).unwrap();
        let warning = fit.convergence.expect("two iterations should not converge");
        assert_eq!(warning.iterations, 2);
        assert_eq!(fit.classifier.predict(&features).unwrap().len(), labels.len());
    }

    #[test]
    fn test_single_class_is_constant_predictor() {
        let (_, features) = TfIdfVectorizer::default()
            .fit_transform(&["good news", "great news"])
            .unwrap();
        let labels = vec![Sentiment::Positive, Sentiment::Positive];
        let fit = LogisticRegression::default().fit(&features, &labels).unwrap();
        assert!(fit.convergence.is_none());
        assert_eq!(
            fit.classifier.predict(&features).unwrap(),
            vec![Sentiment::Positive, Sentiment::Positive]
        );
    }

    #[test]
    fn test_dimension_mismatch_is_a_scoring_error() {
        let (texts, labels) = training_set();
        let (_, features) = TfIdfVectorizer::default().fit_transform(&texts).unwrap();
        let model = LogisticRegression::default().fit(&features, &labels).unwrap().classifier;
        let result = model.predict(&[FeatureVector::zeros(model.n_features() + 1)]);
        assert!(matches!(result, Err(Error::Scoring(_))));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let features = vec![FeatureVector::zeros(3)];
        let result = LogisticRegression::default().fit(&features, &[]);
        assert!(matches!(result, Err(Error::Training(_))));
    }
}
