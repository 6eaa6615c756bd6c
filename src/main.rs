fn main() -> anyhow::Result<()> {
    lead_sync_lib::run()
}
