use pyo3::exceptions::{PyOSError, PyValueError};
use pyo3::prelude::*;
use std::collections::BTreeMap;

use ::neurotwin::{
    life_stage_for_age as rust_life_stage_for_age, parse_timestamp,
    user_id_for as rust_user_id_for, NeuroTwinError, NewProfile, ProfileRecord, ProfileStore as RustProfileStore, StoreConfig,
    VECTOR_DIMENSION,
};

fn to_py_err(err: NeuroTwinError) -> PyErr {
    if err.is_client_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyOSError::new_err(err.to_string())
    }
}

/// Python wrapper for ProfileRecord
#[pyclass]
#[derive(Clone)]
pub struct Profile {
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub gender: String,
    #[pyo3(get)]
    pub life_stage: String,
    #[pyo3(get)]
    pub age_range: String,
    #[pyo3(get)]
    pub timestamp: String,
    #[pyo3(get)]
    pub vector_id: u64,
    #[pyo3(get)]
    pub user_id: String,
    /// Distance to the query; None outside search results
    #[pyo3(get)]
    pub distance: Option<f64>,
}

impl Profile {
    fn from_record(record: ProfileRecord, distance: Option<f64>) -> Self {
        Self {
            name: record.display_name,
            gender: record.gender_label,
            life_stage: record.life_stage,
            age_range: record.age_range,
            timestamp: record.timestamp,
            vector_id: record.vector_id,
            user_id: record.user_id,
            distance,
        }
    }
}

#[pymethods]
impl Profile {
    fn __repr__(&self) -> String {
        match self.distance {
            Some(d) => format!(
                "Profile(vector_id={}, name={:?}, life_stage={:?}, distance={:.6})",
                self.vector_id, self.name, self.life_stage, d
            ),
            None => format!(
                "Profile(vector_id={}, name={:?}, life_stage={:?})",
                self.vector_id, self.name, self.life_stage
            ),
        }
    }
}

/// Python wrapper for the profile store
#[pyclass]
pub struct ProfileStore {
    inner: RustProfileStore,
}

#[pymethods]
impl ProfileStore {
    #[new]
    #[pyo3(signature = (data_dir=None, index_path=None, metadata_path=None))]
    fn new(
        data_dir: Option<String>,
        index_path: Option<String>,
        metadata_path: Option<String>,
    ) -> PyResult<Self> {
        let config = match (index_path, metadata_path) {
            (Some(index), Some(metadata)) => StoreConfig::new(index, metadata),
            (None, None) => data_dir.map(StoreConfig::in_dir).unwrap_or_default(),
            _ => {
                return Err(PyValueError::new_err(
                    "index_path and metadata_path must be given together",
                ))
            }
        };
        let inner = RustProfileStore::open(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// `timestamp` is an ISO-8601 string; the commit time is used when omitted.
    #[pyo3(signature = (vector, name, gender, life_stage, age_range, timestamp=None))]
    #[allow(clippy::too_many_arguments)]
    fn add_profile(
        &self,
        py: Python<'_>,
        vector: Vec<f64>,
        name: String,
        gender: String,
        life_stage: String,
        age_range: String,
        timestamp: Option<String>,
    ) -> PyResult<Profile> {
        let mut profile = NewProfile::new(name, gender, life_stage, age_range);
        if let Some(timestamp) = timestamp {
            profile = profile.with_timestamp(parse_timestamp(&timestamp).map_err(to_py_err)?);
        }
        let record = py
            .allow_threads(|| self.inner.add_profile(&vector, profile))
            .map_err(to_py_err)?;
        Ok(Profile::from_record(record, None))
    }

    #[pyo3(signature = (query, k=5, filters=None))]
    fn find_similar(
        &self,
        py: Python<'_>,
        query: Vec<f64>,
        k: usize,
        filters: Option<BTreeMap<String, String>>,
    ) -> PyResult<Vec<Profile>> {
        let filters = filters.unwrap_or_default();
        let matches = py
            .allow_threads(|| self.inner.find_similar(&query, k, &filters))
            .map_err(to_py_err)?;
        Ok(matches
            .into_iter()
            .map(|m| Profile::from_record(m.record, Some(m.distance)))
            .collect())
    }

    fn vector(&self, vector_id: u64) -> PyResult<Option<Vec<f64>>> {
        self.inner.vector(vector_id).map_err(to_py_err)
    }

    fn records(&self) -> PyResult<Vec<Profile>> {
        let records = self.inner.records().map_err(to_py_err)?;
        Ok(records
            .into_iter()
            .map(|r| Profile::from_record(r, None))
            .collect())
    }

    fn __len__(&self) -> PyResult<usize> {
        self.inner.len().map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        let count = self.inner.len().unwrap_or(0);
        format!(
            "ProfileStore(metadata_path={:?}, len={})",
            self.inner.config().metadata_path,
            count
        )
    }
}

#[pyfunction]
fn user_id_for(display_name: &str) -> String {
    rust_user_id_for(display_name)
}

#[pyfunction]
fn life_stage_for_age(age: u32) -> &'static str {
    rust_life_stage_for_age(age)
}

#[pyfunction]
fn get_vector_dimension() -> usize {
    VECTOR_DIMENSION
}

/// A Python module implemented in Rust.
#[pymodule]
fn neurotwin_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Profile>()?;
    m.add_class::<ProfileStore>()?;
    m.add_function(wrap_pyfunction!(user_id_for, m)?)?;
    m.add_function(wrap_pyfunction!(life_stage_for_age, m)?)?;
    m.add_function(wrap_pyfunction!(get_vector_dimension, m)?)?;
    Ok(())
}
