//! Dataset and algorithm setup of the analysis panels.

use interclust_protocol::{Algorithm, BackendRequest, FeatureMethod, MethodExecution};
use tracing::info;

use crate::config::DatasetConfig;
use crate::error::ClientError;
use crate::transport::Outbox;

/// `attributes` request reason used for the method-3 attribute picker.
pub const ATTRIBUTE_REASON: &str = "method3";

const DEFAULT_K: f64 = 2.0;
const DEFAULT_MIN_SAMPLES: f64 = 5.0;
const DEFAULT_EPS: f64 = 0.5;

/// Algorithm parameters of one panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelParameters {
    /// `k` for pckmeans, minimum samples otherwise.
    pub primary: f64,
    /// Only sent for dbscan.
    pub eps: f64,
}

impl PanelParameters {
    #[must_use]
    pub fn defaults(algorithm: Algorithm) -> Self {
        let primary = match algorithm {
            Algorithm::Pckmeans => DEFAULT_K,
            Algorithm::Dbscan | Algorithm::Optics => DEFAULT_MIN_SAMPLES,
        };
        Self {
            primary,
            eps: DEFAULT_EPS,
        }
    }

    fn values(self, algorithm: Algorithm) -> Vec<f64> {
        if algorithm.takes_eps() {
            vec![self.primary, self.eps]
        } else {
            vec![self.primary]
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisForm {
    dataset: Option<String>,
    separator: String,
    algorithm: Algorithm,
    method: FeatureMethod,
    parameters: Vec<PanelParameters>,
    selected_attributes: Vec<String>,
    known_attributes: Vec<String>,
}

impl AnalysisForm {
    #[must_use]
    pub fn new(config: &DatasetConfig, panels: usize) -> Self {
        Self {
            dataset: config.path.clone(),
            separator: config.separator.clone(),
            algorithm: config.algorithm,
            method: config.method,
            parameters: vec![PanelParameters::defaults(config.algorithm); panels],
            selected_attributes: Vec::new(),
            known_attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[must_use]
    pub fn parameters(&self) -> &[PanelParameters] {
        &self.parameters
    }

    #[must_use]
    pub fn selected_attributes(&self) -> &[String] {
        &self.selected_attributes
    }

    /// Dataset columns reported by the engine.
    #[must_use]
    pub fn known_attributes(&self) -> &[String] {
        &self.known_attributes
    }

    /// Method actually executed: method 3 with extra attributes becomes
    /// `modified_method3`.
    #[must_use]
    pub fn effective_method(&self) -> FeatureMethod {
        if self.method == FeatureMethod::Method3 && !self.selected_attributes.is_empty() {
            FeatureMethod::ModifiedMethod3
        } else {
            self.method
        }
    }

    /// Switches the algorithm and resets every panel's parameters.
    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
        self.parameters.fill(PanelParameters::defaults(algorithm));
    }

    pub fn set_method(&mut self, method: FeatureMethod) -> Result<(), ClientError> {
        if method == FeatureMethod::ModifiedMethod3 {
            return Err(ClientError::InvalidOperation(
                "select method3 and add attributes instead".into(),
            ));
        }
        self.method = method;
        Ok(())
    }

    pub fn set_parameter(&mut self, panel: usize, primary: f64, eps: Option<f64>) -> Result<(), ClientError> {
        let slot = self
            .parameters
            .get_mut(panel)
            .ok_or(ClientError::UnknownPanel(panel))?;
        if !primary.is_finite() || primary <= 0.0 {
            return Err(ClientError::InvalidOperation(
                format!("{} must be positive", self.algorithm.primary_parameter()).into(),
            ));
        }
        slot.primary = primary;
        if let Some(eps) = eps {
            slot.eps = eps;
        }
        Ok(())
    }

    /// Adds an extra attribute for method 3. Duplicates are ignored.
    pub fn select_attribute(&mut self, attribute: &str) -> Result<(), ClientError> {
        if !self.known_attributes.is_empty() && !self.known_attributes.iter().any(|a| a == attribute) {
            return Err(ClientError::InvalidOperation(
                format!("unknown attribute '{attribute}'").into(),
            ));
        }
        if !self.selected_attributes.iter().any(|a| a == attribute) {
            self.selected_attributes.push(attribute.to_string());
        }
        Ok(())
    }

    pub fn clear_attributes(&mut self) {
        self.selected_attributes.clear();
    }

    /// Changes the dataset, drops the extra attributes and asks the engine
    /// for the new column list.
    pub fn set_dataset(&mut self, path: &str, outbox: &mut Outbox) {
        self.dataset = Some(path.to_string());
        self.selected_attributes.clear();
        self.known_attributes.clear();
        outbox.send(&BackendRequest::AttributeList {
            reason: ATTRIBUTE_REASON.into(),
            dataset: path.to_string(),
            separator: self.separator.clone(),
        });
    }

    /// Stores the column list from an `attributes` broadcast.
    pub fn set_known_attributes(&mut self, attributes: Vec<String>) {
        self.known_attributes = attributes;
    }

    /// Configures the engine's data source and runs the feature method for
    /// every panel.
    pub fn start(&self, outbox: &mut Outbox) -> Result<FeatureMethod, ClientError> {
        let Some(dataset) = self.dataset.clone() else {
            return Err(ClientError::InvalidOperation("no dataset configured".into()));
        };
        outbox.send(&BackendRequest::ConfigureDataSource {
            data_source: dataset.clone(),
            separator: self.separator.clone(),
            algorithm: self.algorithm,
        });
        let method = self.effective_method();
        let add_attr = (method == FeatureMethod::ModifiedMethod3).then(|| self.selected_attributes.clone());
        for (id, parameters) in self.parameters.iter().enumerate() {
            outbox.send(&BackendRequest::ExecuteMethod {
                method,
                execution: MethodExecution {
                    id,
                    dataset: dataset.clone(),
                    separator: self.separator.clone(),
                    algorithm: self.algorithm,
                    param: parameters.values(self.algorithm),
                    add_attr: add_attr.clone(),
                },
            });
        }
        info!(dataset = %dataset, algorithm = %self.algorithm, method = %method, "analysis started");
        Ok(method)
    }

    /// Asks the engine for the final clustering as CSV.
    pub fn request_result(&self, outbox: &mut Outbox) {
        outbox.send(&BackendRequest::ClusteringResult);
    }
}
