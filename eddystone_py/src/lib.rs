/*!
# Eddystone Decoder - Python bindings

Exposes the `eddystone` crate's frame decoding to Python. Service data goes
in as `bytes`; UID/EID frames come back as `Beacon` objects, URL frames as
`str` and TLM frames as the raw payload `bytes`.

## Usage

```python
import eddystone_py

data = bytes.fromhex("00e700112233445566778899aabbccddeeff0000")
print(eddystone_py.classify(data))          # "UID"

beacon = eddystone_py.decode_uid(data, rssi=-64)
print(beacon.identifier_hex, beacon.tx_power, beacon.distance)

url = eddystone_py.decode_url(bytes.fromhex("10eb0367697468756207"))
print(url)                                  # "https://github.com"
```

Malformed frames raise `ValueError`.
*/

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyModule};
use pyo3::Bound;
use eddystone::{BeaconObservation, DecodeError, Frame, TelemetryFrame};

fn decode_err(e: DecodeError) -> PyErr {
    tracing::debug!("Rejecting frame: {}", e);
    PyValueError::new_err(e.to_string())
}

/// Python wrapper for a decoded UID/EID observation
#[pyclass(name = "Beacon", frozen)]
pub struct PyBeacon {
    inner: BeaconObservation,
}

#[pymethods]
impl PyBeacon {
    /// Raw identifier bytes (16 for UID, 8 for EID)
    #[getter]
    fn identifier<'py>(&self, py: Python<'py>) -> Bound<'py, PyBytes> {
        PyBytes::new_bound(py, self.inner.identifier())
    }

    /// Identifier as lowercase hex
    #[getter]
    fn identifier_hex(&self) -> String {
        self.inner.identifier_hex()
    }

    /// "UID" or "EID"
    #[getter]
    fn beacon_type(&self) -> String {
        self.inner.beacon_type().to_string()
    }

    #[getter]
    fn rssi(&self) -> i16 {
        self.inner.rssi()
    }

    #[getter]
    fn tx_power(&self) -> i8 {
        self.inner.tx_power()
    }

    /// UID namespace (first 10 identifier bytes), None for EID
    #[getter]
    fn namespace<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyBytes>> {
        self.inner.namespace().map(|ns| PyBytes::new_bound(py, ns))
    }

    /// UID instance (last 6 identifier bytes), None for EID
    #[getter]
    fn instance<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyBytes>> {
        self.inner.instance().map(|inst| PyBytes::new_bound(py, inst))
    }

    /// Attached TLM payload, if any
    #[getter]
    fn telemetry<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyBytes>> {
        self.inner.telemetry().map(|tlm| PyBytes::new_bound(py, tlm))
    }

    /// Estimated distance in meters, None when rssi or tx power is zero
    #[getter]
    fn distance(&self) -> Option<f64> {
        self.inner.estimated_distance()
    }

    /// Return a copy of this beacon carrying the given TLM payload
    fn with_telemetry(&self, payload: &[u8]) -> Self {
        PyBeacon {
            inner: self
                .inner
                .clone()
                .with_telemetry(TelemetryFrame::new(payload)),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Beacon(type={}, identifier={}, rssi={}, tx_power={})",
            self.inner.beacon_type(),
            self.inner.identifier_hex(),
            self.inner.rssi(),
            self.inner.tx_power()
        )
    }
}

/// Classify service data by its frame type byte: "UID", "URL", "TLM", "EID",
/// "Empty" or "Unknown"
#[pyfunction]
fn classify(data: &[u8]) -> &'static str {
    eddystone::classify(data).as_str()
}

/// Decode a UID frame
#[pyfunction]
#[pyo3(signature = (data, rssi=0))]
fn decode_uid(data: &[u8], rssi: i16) -> PyResult<PyBeacon> {
    let inner = eddystone::decode_uid(data, rssi).map_err(decode_err)?;
    Ok(PyBeacon { inner })
}

/// Decode an EID frame
#[pyfunction]
#[pyo3(signature = (data, rssi=0))]
fn decode_eid(data: &[u8], rssi: i16) -> PyResult<PyBeacon> {
    let inner = eddystone::decode_eid(data, rssi).map_err(decode_err)?;
    Ok(PyBeacon { inner })
}

/// Decode a URL frame into the expanded URL string
#[pyfunction]
fn decode_url(data: &[u8]) -> PyResult<String> {
    let url = eddystone::decode_url(data).map_err(decode_err)?;
    Ok(url.into_string())
}

/// Extract the raw payload of a TLM frame
#[pyfunction]
fn decode_telemetry<'py>(py: Python<'py>, data: &[u8]) -> PyResult<Bound<'py, PyBytes>> {
    let payload = eddystone::decode_telemetry(data)
        .map_err(decode_err)?
        .into_payload();
    Ok(PyBytes::new_bound(py, &payload))
}

/// Decode any frame: Beacon for UID/EID, str for URL, bytes for TLM and
/// None for an empty frame
#[pyfunction]
#[pyo3(signature = (data, rssi=0))]
fn decode(py: Python<'_>, data: &[u8], rssi: i16) -> PyResult<PyObject> {
    let frame = eddystone::decode(data, rssi).map_err(decode_err)?;

    let object = match frame {
        Frame::Uid(inner) | Frame::Eid(inner) => {
            Py::new(py, PyBeacon { inner })?.into_py(py)
        }
        Frame::Url(url) => url.into_string().into_py(py),
        Frame::Telemetry(telemetry) => {
            PyBytes::new_bound(py, &telemetry.into_payload()).into_py(py)
        }
        Frame::Empty => py.None(),
    };

    Ok(object)
}

/// Compress a URL into URL frame service data
#[pyfunction]
#[pyo3(signature = (url, tx_power=0))]
fn encode_url<'py>(py: Python<'py>, url: &str, tx_power: i8) -> PyResult<Bound<'py, PyBytes>> {
    let frame = eddystone::encode_url(url, tx_power)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(PyBytes::new_bound(py, &frame))
}

/// Python module definition
#[pymodule]
fn eddystone_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBeacon>()?;
    m.add_function(wrap_pyfunction!(classify, m)?)?;
    m.add_function(wrap_pyfunction!(decode, m)?)?;
    m.add_function(wrap_pyfunction!(decode_uid, m)?)?;
    m.add_function(wrap_pyfunction!(decode_eid, m)?)?;
    m.add_function(wrap_pyfunction!(decode_url, m)?)?;
    m.add_function(wrap_pyfunction!(decode_telemetry, m)?)?;
    m.add_function(wrap_pyfunction!(encode_url, m)?)?;
    m.add("__version__", eddystone::VERSION)?;

    // Add module docstring
    m.add("__doc__", "Eddystone BLE beacon frame decoding")?;

    Ok(())
}
