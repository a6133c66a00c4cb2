use control_plane::config::Config;
use control_plane::kernel::Kernel;
use control_telemetry::init_tracing;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("control-plane");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let config = Config::from_env()?;
        let kernel = Kernel::ignite(config).await?;
        kernel.serve().await
    })
}
