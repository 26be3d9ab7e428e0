use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;

/// Render the network's opaque pairing string as a scannable image,
/// shipped to UI clients as a data URL. `None` when the string cannot be
/// encoded, mirroring how a render failure leaves the UI without a code
/// until the network rotates it.
pub fn pairing_data_url(code: &str) -> Option<String> {
    let qr = QrCode::new(code.as_bytes()).ok()?;
    let image = qr
        .render::<svg::Color>()
        .min_dimensions(280, 280)
        .build();
    Some(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image.as_bytes())
    ))
}
