//! CSV export of readings

use crate::StorageError;
use belimo_protocol::{ActuatorReading, Register};
use tracing::debug;

/// Render readings as UTF-8 CSV.
///
/// Columns: `Time`, `Actuator`, then one column per mapped register in
/// address order, headed by the register label.
pub fn to_csv(readings: &[ActuatorReading]) -> Result<Vec<u8>, StorageError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Time", "Actuator"];
    header.extend(Register::ALL.iter().map(|r| r.label()));
    writer
        .write_record(&header)
        .map_err(|e| StorageError::ExportError(e.to_string()))?;

    for reading in readings {
        let mut row = vec![reading.timestamp.to_rfc3339(), reading.actuator.clone()];
        row.extend(Register::ALL.iter().map(|r| reading.value(*r).to_string()));
        writer
            .write_record(&row)
            .map_err(|e| StorageError::ExportError(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StorageError::ExportError(e.to_string()))?;
    debug!("Exported {} readings ({} bytes)", readings.len(), bytes.len());
    Ok(bytes)
}
