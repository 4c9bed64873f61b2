use std::io::Read;

/// `vard hook claude`: read stdin, evaluate, answer.
///
/// Exit codes: 0 for allow (including internal errors, which degrade to
/// approve), 2 for a blocking decision. The host feeds stderr of a
/// blocking hook back to the model.
pub fn claude() -> anyhow::Result<()> {
    let mut stdin_buf = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut stdin_buf) {
        debug_log(&format!("STDIN READ ERROR: {e}"));
        return Ok(());
    }

    debug_log(&format!(
        "STDIN({} bytes): {}",
        stdin_buf.len(),
        stdin_buf.chars().take(200).collect::<String>()
    ));

    match vard_bridge_claude::hook_entrypoint_from_stdin(&stdin_buf) {
        Ok(result) => {
            if let Some(output) = &result.stdout {
                debug_log(&format!("OK output({} bytes)", output.len()));
                print!("{output}");
            }
            if let Some(warning) = &result.stderr {
                debug_log(&format!("BLOCKED: {warning}"));
                eprintln!("{warning}");
            }
            if result.stdout.is_none() && result.stderr.is_none() {
                debug_log("OK (no output)");
            }
            if result.block {
                std::process::exit(2);
            }
            Ok(())
        }
        Err(e) => {
            debug_log(&format!("ERROR: {e}"));
            // Never strand the host without a decision.
            print!("{}", vard_bridge_claude::fallback_allow_json());
            Ok(())
        }
    }
}

fn debug_log(msg: &str) {
    if !vard_core::config::debug_enabled() {
        return;
    }
    use std::io::Write;
    let log_path = std::env::temp_dir().join("vard-hook-debug.log");
    if let Ok(mut f) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let ts = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let _ = writeln!(f, "[{ts}] {msg}");
    }
}
