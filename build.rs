/// Resolve the version tag embedded in the binary: an explicit
/// DUUX_MOCK_CI_TAG wins, then a checked-in `.tag` file, then git.
fn resolve_tag() -> String {
    if let Ok(env) = std::env::var("DUUX_MOCK_CI_TAG") {
        return env.trim().to_string();
    }

    if let Ok(tag) = std::fs::read_to_string(".tag") {
        return tag.trim().to_string();
    }

    match std::process::Command::new("git")
        .args([
            "-c",
            "core.abbrev=8",
            "show",
            "-s",
            "--format=%cd-%h",
            "--date=format:%Y.%m.%d",
        ])
        .output()
    {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => String::new(),
    }
}

fn main() {
    let tag = resolve_tag();
    println!("cargo:rerun-if-changed=.tag");
    println!("cargo:rerun-if-env-changed=DUUX_MOCK_CI_TAG");
    println!("cargo:rustc-env=DUUX_MOCK_CI_TAG={tag}");
}
