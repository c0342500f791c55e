fn main() -> anyhow::Result<()> {
    proctor_lib::run()
}
