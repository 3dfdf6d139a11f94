use voice_domain::config::{Config, ConfigSeverity};

use crate::providers::build_provider_registry;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("voxgate doctor");
    println!("==============\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_llm_roles(config, &mut all_passed);
    check_agent_providers(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists { config_path.to_owned() } else { format!("{config_path} not found (using defaults)") },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check("Config validation", error_count == 0, format!("{} issue(s) ({error_count} error(s))", issues.len()));
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_llm_roles(config: &Config, all_passed: &mut bool) {
    let count = config.llm.roles.len();
    let ok = count > 0;
    print_check("LLM roles configured", ok, if ok { format!("{count} role(s)") } else { "none configured".into() });
    if !ok {
        *all_passed = false;
    }
}

fn check_agent_providers(config: &Config, all_passed: &mut bool) {
    let registry = build_provider_registry(config);
    for (agent_id, agent) in &config.agents {
        let stt_ok = registry.stt(&agent.stt_provider).is_some();
        let tts_ok = registry.tts(&agent.tts_provider).is_some();
        let ok = stt_ok && tts_ok;
        print_check(
            &format!("Agent '{agent_id}' providers"),
            ok,
            format!("stt={} tts={}", agent.stt_provider, agent.tts_provider),
        );
        if !ok {
            *all_passed = false;
        }
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
