fn main() -> anyhow::Result<()> {
    event_finder_lib::run()
}
