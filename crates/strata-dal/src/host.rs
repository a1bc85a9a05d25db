//! The DAL host: an ordered chain of layers searched first-match-wins.

use std::fmt;
use std::sync::{Arc, RwLock};

use strata_column::{CancelToken, Column, Value};
use tracing::{debug, warn};

use crate::config::DalConfig;
use crate::error::{DalError, DalResult, LayerError};
use crate::layer::{DataAccessLayer, Provenance};

/// Owns an ordered, mutable list of layers.
///
/// Lookups take a snapshot of the list and never hold the lock while a
/// layer is working. Adding or removing layers while lookups are running is
/// permitted by the lock but gives no ordering guarantee; do it during setup
/// or teardown.
pub struct DataAccessLayerHost {
    layers: RwLock<Vec<Arc<dyn DataAccessLayer>>>,
}

impl DataAccessLayerHost {
    /// A host with no layers. Every search on it fails with
    /// [`DalError::DataNotAvailable`].
    pub fn new() -> Self {
        Self {
            layers: RwLock::new(Vec::new()),
        }
    }

    /// A host with the given layers, in order.
    pub fn with_layers(layers: Vec<Arc<dyn DataAccessLayer>>) -> DalResult<Self> {
        let host = Self::new();
        for layer in layers {
            host.add_layer(layer)?;
        }
        Ok(host)
    }

    /// Build every configured layer, in configuration order.
    pub fn from_config(config: &DalConfig) -> DalResult<Self> {
        let host = Self::new();
        for layer_config in &config.layers {
            host.add_layer(layer_config.build()?)?;
        }
        debug!(layers = ?host.layer_names()?, "built dal host from config");
        Ok(host)
    }

    // -----------------------------------------------------------------------
    // Layer list
    // -----------------------------------------------------------------------

    /// Append a layer. Names must be unique within a host.
    pub fn add_layer(&self, layer: Arc<dyn DataAccessLayer>) -> DalResult<()> {
        let mut layers = self.write()?;
        Self::check_unique(&layers, layer.name())?;
        layers.push(layer);
        Ok(())
    }

    /// Insert a layer at `index` (clamped to the list length).
    pub fn insert_layer(&self, index: usize, layer: Arc<dyn DataAccessLayer>) -> DalResult<()> {
        let mut layers = self.write()?;
        Self::check_unique(&layers, layer.name())?;
        let index = index.min(layers.len());
        layers.insert(index, layer);
        Ok(())
    }

    /// Remove the layer called `name`, returning it if present.
    pub fn remove_layer(&self, name: &str) -> DalResult<Option<Arc<dyn DataAccessLayer>>> {
        let mut layers = self.write()?;
        Ok(layers
            .iter()
            .position(|l| l.name() == name)
            .map(|i| layers.remove(i)))
    }

    /// A snapshot of the current layers.
    pub fn layers(&self) -> DalResult<Vec<Arc<dyn DataAccessLayer>>> {
        Ok(self.read()?.clone())
    }

    pub fn layer_names(&self) -> DalResult<Vec<String>> {
        Ok(self.read()?.iter().map(|l| l.name().to_string()).collect())
    }

    pub fn layer(&self, name: &str) -> DalResult<Option<Arc<dyn DataAccessLayer>>> {
        Ok(self.read()?.iter().find(|l| l.name() == name).cloned())
    }

    /// Number of layers. A poisoned lock is an error, not an empty host.
    pub fn len(&self) -> DalResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> DalResult<bool> {
        Ok(self.len()? == 0)
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Search the layers, in order, for one cell.
    pub fn search_for_cell(&self, column: &Column, object_id: &str) -> DalResult<Value> {
        self.search_for_cell_with(column, object_id, &CancelToken::new())
    }

    /// [`search_for_cell`](Self::search_for_cell) with an explicit token.
    ///
    /// The first layer returning a value wins. `CantRespond` and
    /// `DataNotAvailable` move on to the next layer; any other failure is
    /// returned immediately. Exhausting the list is
    /// [`DalError::DataNotAvailable`].
    pub fn search_for_cell_with(
        &self,
        column: &Column,
        object_id: &str,
        cancel: &CancelToken,
    ) -> DalResult<Value> {
        let layers = self.layers()?;
        for layer in &layers {
            cancel.check()?;
            match layer.get_value(column, object_id, cancel) {
                Ok(value) => {
                    debug!(layer = layer.name(), column = %column.id(), object_id, "cell found");
                    return Ok(value.coerce(column.value_type())?);
                }
                Err(LayerError::CantRespond { reason, .. }) => {
                    debug!(layer = layer.name(), column = %column.id(), %reason, "layer cannot respond");
                }
                Err(LayerError::DataNotAvailable { reason, .. }) => {
                    debug!(layer = layer.name(), column = %column.id(), object_id, %reason, "layer has no data");
                }
                Err(LayerError::Failed(DalError::DataNotAvailable { .. })) => {
                    debug!(layer = layer.name(), column = %column.id(), object_id, "layer has no data");
                }
                Err(LayerError::Failed(e)) => {
                    warn!(layer = layer.name(), column = %column.id(), object_id, error = %e, "layer failed");
                    return Err(e);
                }
            }
        }
        Err(DalError::DataNotAvailable {
            column: column.id().to_string(),
            object_id: object_id.to_string(),
        })
    }

    /// Read a cell from the places `provenance` allows.
    ///
    /// With [`Provenance::Any`], a chain that has no data falls back to the
    /// column's own source. Other chain failures are not masked.
    pub fn retrieve(
        &self,
        column: &Column,
        object_id: &str,
        provenance: Provenance,
        cancel: &CancelToken,
    ) -> DalResult<Value> {
        match provenance {
            Provenance::Dal => self.search_for_cell_with(column, object_id, cancel),
            Provenance::Definition => Ok(column.get_value_with(object_id, cancel)?),
            Provenance::Any => match self.search_for_cell_with(column, object_id, cancel) {
                Err(DalError::DataNotAvailable { .. }) => {
                    debug!(column = %column.id(), object_id, "falling back to column source");
                    Ok(column.get_value_with(object_id, cancel)?)
                }
                other => other,
            },
        }
    }

    fn check_unique(layers: &[Arc<dyn DataAccessLayer>], name: &str) -> DalResult<()> {
        if layers.iter().any(|l| l.name() == name) {
            return Err(DalError::InvalidLayer(format!(
                "a layer named {name:?} is already registered"
            )));
        }
        Ok(())
    }

    fn read(&self) -> DalResult<std::sync::RwLockReadGuard<'_, Vec<Arc<dyn DataAccessLayer>>>> {
        self.layers
            .read()
            .map_err(|e| DalError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> DalResult<std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn DataAccessLayer>>>> {
        self.layers
            .write()
            .map_err(|e| DalError::LockPoisoned(e.to_string()))
    }
}

impl Default for DataAccessLayerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataAccessLayerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.layer_names().unwrap_or_default();
        f.debug_struct("DataAccessLayerHost")
            .field("layers", &names)
            .finish()
    }
}
