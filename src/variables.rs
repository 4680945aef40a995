//! Live variable registry.
//!
//! The registry holds the authoritative current value of every session
//! variable. The scheduler thread owns it: drivers mutate it during a tick,
//! the ring buffer snapshots it into history, and playback loads history
//! back into it.

use crate::error::{Result, SessionError};
use crate::id::VarId;
use crate::types::VariableType;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the built-in simulation time variable, always `VarId(0)`.
pub const TIME_VARIABLE_NAME: &str = "time[sec]";

/// Static description of a registered variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    pub id: VarId,
    pub name: String,
    pub var_type: VariableType,
}

/// Mutable registry of live values
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    descriptors: Vec<VariableDescriptor>,
    values: Vec<f64>,
    by_name: HashMap<String, VarId>,
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableRegistry {
    /// Create a registry holding only the time variable
    pub fn new() -> Self {
        let mut registry = Self {
            descriptors: Vec::new(),
            values: Vec::new(),
            by_name: HashMap::new(),
        };
        registry.push_descriptor(TIME_VARIABLE_NAME.to_string(), VariableType::Double);
        registry
    }

    fn push_descriptor(&mut self, name: String, var_type: VariableType) -> VarId {
        let id = VarId(self.descriptors.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.descriptors.push(VariableDescriptor { id, name, var_type });
        self.values.push(0.0);
        id
    }

    /// Register a new variable, initialized to zero
    pub fn register(&mut self, name: impl Into<String>, var_type: VariableType) -> Result<VarId> {
        let name = name.into();
        if name.is_empty() {
            return Err(SessionError::InvalidRequest(
                "variable name must not be empty".to_string(),
            ));
        }
        if self.by_name.contains_key(&name) {
            return Err(SessionError::InvalidRequest(format!(
                "variable '{}' is already registered",
                name
            )));
        }
        Ok(self.push_descriptor(name, var_type))
    }

    /// The built-in time variable
    #[inline]
    pub fn time_id(&self) -> VarId {
        VarId(0)
    }

    /// Look up a variable by name
    pub fn find(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    /// Current value, or `None` for an id outside the registry
    pub fn get(&self, id: VarId) -> Option<f64> {
        self.values.get(id.index()).copied()
    }

    /// Set a value, quantized to the variable's type. Returns false for an unknown id.
    pub fn set(&mut self, id: VarId, value: f64) -> bool {
        let Some(desc) = self.descriptors.get(id.index()) else {
            return false;
        };
        self.values[id.index()] = desc.var_type.quantize(value);
        true
    }

    /// Current simulation time
    pub fn time(&self) -> f64 {
        self.values[0]
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[VariableDescriptor] {
        &self.descriptors
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Raw access for buffer reads; values are already quantized in history.
    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Immutable, shareable view of names and types
    pub fn catalog(&self) -> VariableCatalog {
        VariableCatalog {
            descriptors: Arc::new(self.descriptors.clone()),
            by_name: Arc::new(self.by_name.clone()),
        }
    }
}

/// Read-only name/type lookup that can be shared across threads
#[derive(Debug, Clone, Default)]
pub struct VariableCatalog {
    descriptors: Arc<Vec<VariableDescriptor>>,
    by_name: Arc<HashMap<String, VarId>>,
}

impl VariableCatalog {
    pub fn find(&self, name: &str) -> Option<&VariableDescriptor> {
        self.by_name
            .get(name)
            .and_then(|id| self.descriptors.get(id.index()))
    }

    pub fn get(&self, id: VarId) -> Option<&VariableDescriptor> {
        self.descriptors.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
