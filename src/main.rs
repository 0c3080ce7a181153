use clavio::ClavioApp;
use clavio::update_check;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clavio=info")),
        )
        .init();

    let manifest = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("latest-version")));
    let update_rx = update_check::spawn(
        env!("CARGO_PKG_VERSION"),
        update_check::manifest_fetcher(manifest.unwrap_or_else(|| "latest-version".into())),
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("Clavio"),
        ..Default::default()
    };

    let _ = eframe::run_native(
        "Clavio",
        options,
        Box::new(|_cc| Ok(Box::new(ClavioApp::new(update_rx)))),
    );
}
