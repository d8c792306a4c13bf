//! Skill Integration Tests
//!
//! Registration through the engine and skills invoked from commands.

use interactivity_core::SkillModule;
use interactivity_skills::{discover_modules, SkillsConfig, UnavailableModule};
#[cfg(feature = "plot")]
use interactivity_skills::plot::PlotModule;
#[cfg(feature = "tables")]
use interactivity_skills::tables::{TablesModule, LOAD_FAILURE_MESSAGE};
#[cfg(feature = "tables")]
use std::io::Write;

use super::session_with;

async fn run_with(modules: Vec<Box<dyn SkillModule>>, input: &str) -> Vec<String> {
    let (mut session, buffer) = session_with(&modules);
    session.run(input.as_bytes()).await;
    buffer.lines()
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_unavailable_skill_prints_one_line() {
    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(UnavailableModule::new(
        "chat",
        &["chat", "chat4"],
        "Error: chat support not built. Rebuild with --features chat\nsecond line is dropped",
    ))];
    let lines = run_with(modules, "chat('hello')\nchat4()\n1+1\n").await;
    assert_eq!(
        lines,
        vec![
            "Error: chat support not built. Rebuild with --features chat",
            "Error: chat support not built. Rebuild with --features chat",
            "2",
        ]
    );
}

#[tokio::test]
async fn test_skill_cannot_shadow_core_name() {
    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(UnavailableModule::new(
        "rogue",
        &["print", "len"],
        "Error: rogue",
    ))];
    let lines = run_with(modules, "print('still core')\nlen([1, 2])\n").await;
    assert_eq!(lines, vec!["still core", "2"]);
}

#[tokio::test]
async fn test_first_registered_skill_wins() {
    let modules: Vec<Box<dyn SkillModule>> = vec![
        Box::new(UnavailableModule::new("first", &["plot"], "Error: first")),
        Box::new(UnavailableModule::new("second", &["plot"], "Error: second")),
    ];
    let lines = run_with(modules, "plot([1, 2, 3])\n").await;
    assert_eq!(lines, vec!["Error: first"]);
}

#[cfg(feature = "plot")]
#[tokio::test]
async fn test_first_registered_skill_wins_over_real_module() {
    let modules: Vec<Box<dyn SkillModule>> = vec![
        Box::new(UnavailableModule::new("first", &["plot"], "Error: first")),
        Box::new(PlotModule),
    ];
    let lines = run_with(modules, "plot([1, 2, 3])\n").await;
    assert_eq!(lines, vec!["Error: first"]);
}

#[tokio::test]
async fn test_available_lists_skills() {
    let modules = discover_modules(&SkillsConfig::default());
    let lines = run_with(modules, "'csv_table' in available()\n'plot' in available()\n").await;
    assert_eq!(lines, vec!["True", "True"]);
}

#[tokio::test]
async fn test_user_binding_shadows_skill() {
    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(UnavailableModule::new(
        "plot",
        &["plot"],
        "Error: plot",
    ))];
    let lines = run_with(modules, "plot = 3\nplot + 1\n").await;
    assert_eq!(lines, vec!["4"]);
}

#[cfg(not(feature = "plot"))]
#[tokio::test]
async fn test_plot_without_feature_explains_rebuild() {
    let modules = discover_modules(&SkillsConfig::default());
    let lines = run_with(modules, "plot([1, 2])\n").await;
    assert_eq!(
        lines,
        vec!["Error: plotting support not built. Rebuild with --features plot"]
    );
}

#[cfg(not(feature = "tables"))]
#[tokio::test]
async fn test_tables_without_feature_explain_rebuild() {
    let modules = discover_modules(&SkillsConfig::default());
    let lines = run_with(modules, "csv_table('a.csv')\nexcel_table('a.xlsx')\n").await;
    assert_eq!(
        lines,
        vec![
            "Error: table support not built. Rebuild with --features tables",
            "Error: table support not built. Rebuild with --features tables",
        ]
    );
}

// ============================================================================
// Skills from commands
// ============================================================================

#[cfg(feature = "plot")]
#[tokio::test]
async fn test_plot_from_command() {
    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(PlotModule)];
    let lines = run_with(
        modules,
        "ys = []\nfor x in range(5): ys.append(x * x)\nplot(ys, color='red')\n",
    )
    .await;
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("![Plot](data:image/png;base64,"));
}

#[cfg(feature = "plot")]
#[tokio::test]
async fn test_plot_title_keyword_is_rejected() {
    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(PlotModule)];
    let lines = run_with(modules, "plot([1, 2], title='Squares')\n").await;
    assert_eq!(
        lines,
        vec!["Error: plot() got an unexpected keyword argument 'title'"]
    );
}

#[cfg(feature = "plot")]
#[tokio::test]
async fn test_self_containing_argument_is_reported() {
    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(PlotModule)];
    let lines = run_with(modules, "l = [1]\nl.append(l)\nplot(l)\nplot(y=[1, 2])\n").await;
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Error: Circular reference detected");
    assert!(lines[1].starts_with("![Plot](data:image/png;base64,"));
}

#[cfg(feature = "plot")]
#[tokio::test]
async fn test_plot_error_is_reported() {
    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(PlotModule)];
    let lines = run_with(modules, "plot()\n").await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Error: "));
}

#[cfg(feature = "tables")]
#[tokio::test]
async fn test_csv_table_from_command() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "day;km").unwrap();
    writeln!(file, "Mon;5.2").unwrap();
    writeln!(file, "Tue;10").unwrap();
    let path = file.path().to_string_lossy().replace('\\', "/");

    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(TablesModule)];
    let lines = run_with(modules, &format!("csv_table('{}', sep=';')\n", path)).await;
    assert_eq!(
        lines,
        vec![
            "",
            "|     | day |  km |",
            "|----:|:----|----:|",
            "|   0 | Mon | 5.2 |",
            "|   1 | Tue |  10 |",
            "",
        ]
    );
}

#[cfg(feature = "tables")]
#[tokio::test]
async fn test_csv_table_unreadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.csv");
    let path = path.to_string_lossy().replace('\\', "/");

    let modules: Vec<Box<dyn SkillModule>> = vec![Box::new(TablesModule)];
    let lines = run_with(modules, &format!("csv_table('{}')\n", path)).await;
    assert_eq!(lines, vec![LOAD_FAILURE_MESSAGE.to_string(), String::new()]);
}
