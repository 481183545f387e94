//! Unit constants and conversions.
//!
//! Presentation geometry is expressed in English Metric Units (EMU);
//! run-level font sizes in the markup are hundredths of a point.

pub const EMUS_PER_INCH: i64 = 914_400;
pub const EMUS_PER_CM: i64 = 360_000;
pub const EMUS_PER_PT: i64 = 12_700;

/// Font sizes in run properties (`sz="1800"`) are centipoints.
pub const CENTIPOINTS_PER_PT: u32 = 100;

#[inline]
pub fn pt_to_emu(pt: i64) -> i64 {
    pt.saturating_mul(EMUS_PER_PT)
}

#[inline]
pub fn emu_to_pt_f64(emu: i64) -> f64 {
    emu as f64 / EMUS_PER_PT as f64
}

/// Convert a centipoint font size to EMU.
#[inline]
pub fn centipt_to_emu(centipt: u32) -> i64 {
    centipt as i64 * EMUS_PER_PT / CENTIPOINTS_PER_PT as i64
}

#[inline]
pub fn pt_to_centipt(pt: u32) -> u32 {
    pt.saturating_mul(CENTIPOINTS_PER_PT)
}
