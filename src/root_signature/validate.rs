use crate::error::{Error, Result};

use super::types::{RootParameterPayload, RootSignatureDesc};

/// Checked before serialisation (spec.md §4.5): every descriptor table must
/// be uniform, and every range type must be one recognised at parse time
/// already, so this only needs to re-check uniformity here.
pub fn validate_root_signature(desc: &RootSignatureDesc) -> Result<()> {
    for param in &desc.parameters {
        if let RootParameterPayload::DescriptorTable(table) = &param.payload {
            if !table.is_uniform() {
                return Err(Error::invalid_argument(
                    "descriptor table mixes sampler and non-sampler ranges",
                ));
            }
        }
    }
    Ok(())
}
