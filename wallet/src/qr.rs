use std::path::{Path, PathBuf};

use qrcode::QrCode;

/// Renders a payment request to a PNG under `dir`. The file lives for one
/// send; a scheduled sweep reclaims the directory.
pub fn write_qr(bolt11: &str, label: &str, dir: &str) -> Result<PathBuf, String> {
    let code = QrCode::new(bolt11.to_uppercase().as_bytes()).map_err(|e| e.to_string())?;
    let image = code
        .render::<image::Luma<u8>>()
        .min_dimensions(256, 256)
        .build();

    let path = Path::new(dir).join(format!("{}.png", sanitize(label)));
    image.save(&path).map_err(|e| e.to_string())?;
    Ok(path)
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
