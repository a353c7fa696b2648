fn emit_vergen() -> Result<(), Box<dyn std::error::Error>> {
    use vergen_gitcl::*;

    let build = BuildBuilder::default().build_date(true).build()?;
    let cargo = CargoBuilder::default().debug(true).target_triple(true).build()?;
    let rustc = RustcBuilder::default().semver(true).build()?;
    // outside of a git checkout vergen falls back to placeholder values,
    // version.rs replaces those with the crate version
    let git = GitclBuilder::default().describe(true, true, None).sha(true).build()?;

    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&cargo)?
        .add_instructions(&rustc)?
        .add_instructions(&git)?
        .emit()?;

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RABBITCAT_RELEASE_VERSION");
    emit_vergen()?;
    Ok(())
}
