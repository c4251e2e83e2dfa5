/// Run one pose detection on an image file through the method channel
/// Run with: cargo run --example detect_image -- <config.json> <image>
/// Add `--features ml-onnx` for real inference
use pose_bridge::{BridgeChannel, BridgeConfig, DefaultPoseEngine, MethodCall, MethodDispatcher, CHANNEL_NAME};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (config_path, image_path) = match (args.next(), args.next()) {
        (Some(config), Some(image)) => (config, image),
        _ => {
            eprintln!("usage: detect_image <config.json> <image>");
            std::process::exit(2);
        }
    };

    let config = BridgeConfig::load(&config_path)?;
    let image_data = std::fs::read(&image_path)?;

    let dispatcher = MethodDispatcher::new(BridgeChannel::<DefaultPoseEngine>::new());
    println!("=== {} (session {}) ===\n", CHANNEL_NAME, dispatcher.bridge().session_id());

    let init = dispatcher
        .handle_async(&MethodCall::new("initialize", serde_json::to_value(&config)?))
        .await;
    println!("initialize -> {}", init);
    if let Some(info) = dispatcher.bridge().model_info() {
        println!("  model: {}", info);
    }

    let reply = dispatcher
        .handle_async(&MethodCall::new("detectPose", json!({ "imageData": image_data })))
        .await;
    println!("detectPose -> {}", serde_json::to_string_pretty(&reply)?);

    let dispose = dispatcher.handle_async(&MethodCall::new("dispose", json!(null))).await;
    println!("dispose -> {}", dispose);

    Ok(())
}
