//! End-to-end pipeline tests against a temporary fixture repository.
//!
//! These exercise the full recon → parse → map → synthesize chain on
//! real files, plus the write discipline of the orchestrator.

#![allow(clippy::unwrap_used)]

use reformar::{
    apply_modification, ClusterKind, Pipeline, PipelineConfig, ScoringConfig, SelectorKind,
    UNKNOWN_PAGE_CLASS,
};
use std::fs;
use tempfile::TempDir;

const LOGIN_PAGE: &str = r"export class LoginPage {
  constructor(page) {
    this.page = page;
  }

  readonly emailField = this.page.getByLabel('Email');
  readonly signInBtn = this.page.getByTestId('sign-in-button');

  async signIn(email, password) {
    await this.emailField.fill(email);
    await this.signInBtn.click();
  }
}
";

const DASHBOARD_PAGE: &str = r"export class DashboardPage {
  constructor(page) {
    this.page = page;
  }

  readonly welcomeBanner = this.page.getByTestId('welcome-banner');
}
";

const FIXTURES: &str = r"import { test as base } from '@playwright/test';
import { LoginPage } from './login.page';
import { DashboardPage } from './dashboard.page';

export const test = base.extend({
  loginPage: async ({ page }, use) => {
    await use(new LoginPage(page));
  },
  dashboardPage: async ({ page }, use) => {
    await use(new DashboardPage(page));
  },
});
export { expect } from '@playwright/test';
";

const SCRIPT: &str = r"await page.goto('/login');
const email = 'user@example.com';
await page.getByLabel('Email').fill(email);
await page.getByLabel('Password').fill('hunter2');
await page.getByTestId('sign-in-button').click();
await expect(page.getByTestId('welcome-banner')).toBeVisible();
";

fn fake_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let pages = dir.path().join("pages");
    fs::create_dir_all(&pages).unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    fs::write(pages.join("login.page.ts"), LOGIN_PAGE).unwrap();
    fs::write(pages.join("dashboard.page.ts"), DASHBOARD_PAGE).unwrap();
    fs::write(pages.join("fixtures.ts"), FIXTURES).unwrap();
    fs::write(
        dir.path().join("playwright.config.ts"),
        "export default {};\n",
    )
    .unwrap();
    dir
}

fn config(repo: &TempDir) -> PipelineConfig {
    PipelineConfig {
        repo_root: repo.path().to_path_buf(),
        instruction: "log in and see the dashboard".to_string(),
        dry_run: true,
        scoring: ScoringConfig::default(),
        ..PipelineConfig::default()
    }
}

// ============================================================================
// Analysis phases end to end
// ============================================================================

#[test]
fn known_selectors_map_to_existing_properties() {
    let repo = fake_repo();
    let graph = Pipeline::new(config(&repo)).analyze(SCRIPT).unwrap();

    let email = graph
        .mappings
        .iter()
        .find(|m| m.selector.kind == SelectorKind::Label && m.selector.value == "Email")
        .unwrap();
    assert_eq!(email.target_class, "LoginPage");
    assert_eq!(email.target_property, "emailField");
    assert!(!email.is_new_property);
    assert!((email.confidence - 1.0).abs() < f64::EPSILON);

    let banner = graph
        .mappings
        .iter()
        .find(|m| m.selector.value == "welcome-banner")
        .unwrap();
    assert_eq!(banner.target_class, "DashboardPage");
    assert!(!banner.is_new_property);
}

#[test]
fn unknown_selector_becomes_new_property_on_best_class() {
    let repo = fake_repo();
    let graph = Pipeline::new(config(&repo)).analyze(SCRIPT).unwrap();

    let password = graph
        .mappings
        .iter()
        .find(|m| m.selector.value == "Password")
        .unwrap();
    assert!(password.is_new_property);
    assert_ne!(password.target_class, UNKNOWN_PAGE_CLASS);
    assert!(!password.reasoning.is_empty());

    // the staged modification targets the owning class's real file
    let modification = graph
        .modifications
        .iter()
        .find(|m| m.class_name == password.target_class)
        .unwrap();
    assert!(repo.path().join(&modification.file_path).is_file());
    assert!(modification.new_property_lines[0].contains("getByLabel('Password')"));
}

#[test]
fn script_clusters_cover_all_tokens_in_order() {
    let repo = fake_repo();
    let graph = Pipeline::new(config(&repo)).analyze(SCRIPT).unwrap();

    let clustered: usize = graph.script.clusters.iter().map(|c| c.tokens.len()).sum();
    assert_eq!(clustered, graph.script.tokens.len());
    assert_eq!(graph.script.clusters[0].kind, ClusterKind::Navigation);
    assert_eq!(graph.script.test_data.len(), 1);
    assert_eq!(graph.script.test_data[0].variable, "email");
}

#[test]
fn generated_test_uses_fixtures_and_variables() {
    let repo = fake_repo();
    let graph = Pipeline::new(config(&repo)).analyze(SCRIPT).unwrap();
    let content = &graph.generated.content;

    assert!(content.contains("import { test, expect } from '../pages/fixtures';"));
    assert!(content.contains("loginPage.emailField.fill(email)"));
    assert!(content.contains("await expect(page.getByTestId('welcome-banner')).toBeVisible();"));
    assert!(graph
        .generated
        .required_fixtures
        .contains(&"loginPage".to_string()));
    assert!(graph
        .generated
        .file_path
        .ends_with("tests/log-in-and-see-the-dashboard.spec.ts"));
}

// ============================================================================
// Write discipline
// ============================================================================

#[tokio::test]
async fn dry_run_leaves_repository_untouched() {
    let repo = fake_repo();
    let before = fs::read_to_string(repo.path().join("pages/login.page.ts")).unwrap();
    let report = Pipeline::new(config(&repo)).run(SCRIPT).await;

    assert!(report.success);
    assert!(report.modified_files.is_empty());
    assert_eq!(
        fs::read_to_string(repo.path().join("pages/login.page.ts")).unwrap(),
        before
    );
    assert!(!repo
        .path()
        .join("tests/log-in-and-see-the-dashboard.spec.ts")
        .exists());
}

#[test]
fn applied_modification_round_trips_through_recon() {
    let repo = fake_repo();
    let graph = Pipeline::new(config(&repo)).analyze(SCRIPT).unwrap();

    let modification = graph
        .modifications
        .iter()
        .find(|m| !m.new_property_lines.is_empty())
        .unwrap();
    let path = repo.path().join(&modification.file_path);
    let before = fs::read_to_string(&path).unwrap();
    fs::write(&path, apply_modification(&before, modification)).unwrap();

    // a rescan must now resolve the previously-unknown selector directly
    let graph2 = Pipeline::new(config(&repo)).analyze(SCRIPT).unwrap();
    let password = graph2
        .mappings
        .iter()
        .find(|m| m.selector.value == "Password")
        .unwrap();
    assert!(!password.is_new_property);
    assert!((password.confidence - 1.0).abs() < f64::EPSILON);
}
