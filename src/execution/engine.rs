//! Provisioning Engine
//!
//! Drives the stages of an installation strictly in order:
//!
//! 1. OS packages (optional)
//! 2. dedicated account
//! 3. distribution download, install, `conda init` and shell merge
//! 4. base environment update and population
//! 5. one named environment per listed tool
//!
//! Every stage first checks whether its target already exists. Existing
//! accounts and installations are confirmed with the operator before they
//! are reused. The first error ends the run.

use log::{info, warn};

use super::command::CommandRunner;
use super::privilege::RunAs;
use crate::config::{InstallMode, Settings};
use crate::environment::{load_package_list, EnvStatus, EnvironmentManager, PackageSpec};
use crate::error::Result;
use crate::monitoring::{Stage, StageResult, StageTimeline};
use crate::prompt::Prompter;
use crate::shell::merge_init_block;
use crate::system::{install_os_packages, Account};

/// How the account stage was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Created(RunAs),
    Existing(RunAs),
    Local(RunAs),
    Declined,
}

/// How the distribution stage was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionStatus {
    Installed,
    AlreadyInstalled,
}

/// Environments handled by the tool stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every stage ran to completion
    Completed(EnvReport),
    /// The operator chose not to reuse an existing account
    Declined,
}

/// Runs the provisioning pipeline.
///
/// # Example
///
/// ```rust,no_run
/// use seisbio::config::{Distribution, Settings};
/// use seisbio::execution::{Provisioner, SystemRunner};
/// use seisbio::prompt::TerminalPrompter;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = Settings::new(Distribution::Mambaforge);
///     let runner = SystemRunner::new()?;
///     let mut prompter = TerminalPrompter;
///
///     let mut provisioner = Provisioner::new(settings, &runner, &mut prompter);
///     provisioner.run()?;
///     println!("{}", provisioner.timeline().summary());
///     Ok(())
/// }
/// ```
pub struct Provisioner<'a> {
    settings: Settings,
    runner: &'a dyn CommandRunner,
    prompter: &'a mut dyn Prompter,
    timeline: StageTimeline,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        settings: Settings,
        runner: &'a dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            settings,
            runner,
            prompter,
            timeline: StageTimeline::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn timeline(&self) -> &StageTimeline {
        &self.timeline
    }

    /// Runs every stage in order.
    ///
    /// The package list is read before anything is changed, so a broken
    /// list fails the run without side effects.
    pub fn run(&mut self) -> Result<Outcome> {
        let specs = load_package_list(&self.settings.package_list)?;
        info!(
            "{} tool environments requested in {}",
            specs.len(),
            self.settings.package_list.display()
        );

        // 1. OS packages
        if self.settings.install_os_packages {
            self.timeline.start(Stage::SystemPackages);
            let result = install_os_packages(self.runner, &self.settings);
            self.record(Stage::SystemPackages, result, |_| StageResult::Completed)?;
        } else {
            self.timeline.finish(
                Stage::SystemPackages,
                StageResult::Skipped("not requested".to_string()),
            );
        }

        // 2. Account
        self.timeline.start(Stage::Account);
        let result = self.ensure_account();
        let status = self.record(Stage::Account, result, |status| match status {
            AccountStatus::Created(_) => StageResult::Completed,
            AccountStatus::Existing(_) => StageResult::Skipped("already exists".to_string()),
            AccountStatus::Local(_) => StageResult::Skipped("local install".to_string()),
            AccountStatus::Declined => StageResult::Declined,
        })?;

        let context = match status {
            AccountStatus::Created(ctx) | AccountStatus::Existing(ctx) | AccountStatus::Local(ctx) => ctx,
            AccountStatus::Declined => {
                info!("Exiting without changes.");
                return Ok(Outcome::Declined);
            }
        };

        // 3. Distribution
        self.timeline.start(Stage::Distribution);
        let result = self.ensure_distribution(&context);
        let distribution = self.record(Stage::Distribution, result, |status| match status {
            DistributionStatus::Installed => StageResult::Completed,
            DistributionStatus::AlreadyInstalled => {
                StageResult::Skipped("already installed".to_string())
            }
        })?;

        // 4. Base environment
        self.timeline.start(Stage::BaseEnvironment);
        let fresh = distribution == DistributionStatus::Installed;
        let result = self.populate_base(&context, fresh);
        self.record(Stage::BaseEnvironment, result, |updated| {
            if *updated {
                StageResult::Completed
            } else {
                StageResult::Declined
            }
        })?;

        // 5. Tool environments
        self.timeline.start(Stage::ToolEnvironments);
        let result = self.create_tool_envs(&context, &specs);
        let report = self.record(Stage::ToolEnvironments, result, |report| {
            if report.created.is_empty() {
                StageResult::Skipped("all present".to_string())
            } else {
                StageResult::Completed
            }
        })?;

        info!("All packages installed");
        Ok(Outcome::Completed(report))
    }

    fn record<T>(
        &mut self,
        stage: Stage,
        result: Result<T>,
        classify: impl FnOnce(&T) -> StageResult,
    ) -> Result<T> {
        match &result {
            Ok(value) => self.timeline.finish(stage, classify(value)),
            Err(_) => self.timeline.finish(stage, StageResult::Failed),
        }
        result
    }

    /// Makes sure the installing account exists.
    ///
    /// An existing home directory is never recreated; the operator decides
    /// whether to keep using it.
    pub fn ensure_account(&mut self) -> Result<AccountStatus> {
        let (name, uid) = match &self.settings.mode {
            InstallMode::Local { home } => {
                info!("Local installation into {}", home.display());
                return Ok(AccountStatus::Local(RunAs::new(home, None)));
            }
            InstallMode::SystemWide { account, uid } => (account.clone(), *uid),
        };

        let account = Account::new(name, &self.settings.home_root, uid);
        info!("Creating {} user if not exists.", account.name());

        if !account.exists() {
            let identity = account.create(self.runner)?;
            return Ok(AccountStatus::Created(RunAs::new(
                account.home(),
                Some(identity),
            )));
        }

        warn!("{} user already exists!!!", account.name());
        info!("Consider deleting this user:");
        info!("   $ sudo userdel -r {}", account.name());

        let question = format!("Continue with the existing '{}' account?", account.name());
        if !self.prompter.confirm(&question)? {
            return Ok(AccountStatus::Declined);
        }

        let identity = account.identity()?;
        Ok(AccountStatus::Existing(RunAs::new(account.home(), Some(identity))))
    }

    /// Downloads and installs the distribution unless its prefix exists.
    ///
    /// A fresh system-wide install also merges the shell initialisation
    /// block into the system shell resource file.
    pub fn ensure_distribution(&mut self, context: &RunAs) -> Result<DistributionStatus> {
        let distribution = self.settings.distribution;
        let prefix = self.settings.prefix();

        if prefix.exists() {
            info!("{} already installed.", distribution);
            return Ok(DistributionStatus::AlreadyInstalled);
        }

        let timeout = self.settings.timeout;

        info!("Downloading {} installer", distribution);
        self.runner.run(
            &context
                .command("wget")
                .args(["-N", distribution.installer_url()])
                .timeout(timeout),
        )?;

        info!("Installing {} into {}", distribution, prefix.display());
        self.runner.run(
            &context
                .command("bash")
                .arg(self.settings.installer_path().display().to_string())
                .args(["-b", "-p"])
                .arg(prefix.display().to_string())
                .timeout(timeout),
        )?;

        self.runner.run(
            &context
                .command(self.settings.conda_bin())
                .arg("init")
                .timeout(timeout),
        )?;

        if self.settings.is_system_wide() {
            info!("Updating {}", self.settings.system_bashrc.display());
            merge_init_block(&self.settings.user_bashrc(), &self.settings.system_bashrc)?;
        }

        Ok(DistributionStatus::Installed)
    }

    /// Updates the distribution and installs the base packages.
    ///
    /// Returns false when the operator declined to touch a distribution
    /// that was already installed.
    pub fn populate_base(&mut self, context: &RunAs, fresh: bool) -> Result<bool> {
        if !fresh {
            let question = format!(
                "{} is already installed. Update it and install the base packages?",
                self.settings.distribution
            );
            if !self.prompter.confirm(&question)? {
                info!("Leaving the base environment as it is.");
                return Ok(false);
            }
        }

        let manager = EnvironmentManager::new(&self.settings, context.clone());
        info!("Updating {} and installing basic packages.", self.settings.distribution);
        manager.update_base(self.runner)?;
        manager.install_base(self.runner, &self.settings.base_packages)?;
        Ok(true)
    }

    /// Creates the environment of every listed package that is missing.
    pub fn create_tool_envs(&mut self, context: &RunAs, specs: &[PackageSpec]) -> Result<EnvReport> {
        let manager = EnvironmentManager::new(&self.settings, context.clone());
        let mut listing = manager.list_envs(self.runner)?;
        let mut report = EnvReport::default();

        for spec in specs {
            match manager.ensure_env(self.runner, &listing, spec)? {
                EnvStatus::Created(name) => {
                    listing.insert(name.clone());
                    report.created.push(name);
                }
                EnvStatus::AlreadyInstalled(name) => report.existing.push(name),
            }
        }

        info!(
            "{} environments created, {} already present",
            report.created.len(),
            report.existing.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::{tempdir, TempDir};

    use crate::config::Distribution;
    use crate::error::ProvisionError;
    use crate::execution::testing::{RecordingRunner, ScriptedPrompter};
    use crate::execution::Invocation;
    use crate::shell::{backup_path, INIT_END, INIT_START};

    const LISTING: &str = "\
# conda environments:
#
base                  *  /home/seisbio/mambaforge
samtools-env             /home/seisbio/mambaforge/envs/samtools-env
";

    struct Fixture {
        _root: TempDir,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let etc = root.path().join("etc");
            fs::create_dir(&etc).unwrap();
            fs::write(etc.join("bash.bashrc"), "# system defaults\n").unwrap();

            let list = root.path().join("packages.txt");
            fs::write(&list, "# tools\nsamtools\nhicexplorer=3.2\nbwa\n").unwrap();

            let mut settings = Settings::new(Distribution::Mambaforge);
            settings.home_root = root.path().join("home");
            settings.system_bashrc = etc.join("bash.bashrc");
            settings.package_list = list;
            fs::create_dir(&settings.home_root).unwrap();

            Self {
                _root: root,
                settings,
            }
        }

        fn home(&self) -> PathBuf {
            self.settings.home()
        }

        fn create_home(&self) {
            fs::create_dir(self.home()).unwrap();
        }

        fn create_prefix(&self) {
            fs::create_dir_all(self.settings.prefix()).unwrap();
        }

        fn system_bashrc(&self) -> String {
            fs::read_to_string(&self.settings.system_bashrc).unwrap()
        }

        /// Runner whose adduser/installer/init calls leave the same traces
        /// on disk as the real commands.
        fn runner(&self, bashrc: &str) -> RecordingRunner {
            let home = self.home();
            let prefix = self.settings.prefix();
            let user_bashrc = self.settings.user_bashrc();
            let bashrc = bashrc.to_string();

            RecordingRunner::new()
                .with_output("info --envs", LISTING)
                .on("adduser", move |_| fs::create_dir(&home).unwrap())
                .on("-b -p", move |_| fs::create_dir_all(&prefix).unwrap())
                .on("conda init", move |_| fs::write(&user_bashrc, &bashrc).unwrap())
        }
    }

    fn init_bashrc() -> String {
        format!("alias ll='ls -l'\n{}\nexport PATH=/opt/conda:$PATH\n{}\n", INIT_START, INIT_END)
    }

    fn creates_for(runner: &RecordingRunner) -> Vec<Invocation> {
        runner.calls().into_iter().filter(|c| c.has_arg("create")).collect()
    }

    #[test]
    fn test_full_run_fresh_machine() {
        let fx = Fixture::new();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[]);

        let mut provisioner = Provisioner::new(fx.settings.clone(), &runner, &mut prompter);
        let outcome = provisioner.run().unwrap();

        let report = match outcome {
            Outcome::Completed(report) => report,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(report.created, vec!["hicexplorer32-env", "bwa-env"]);
        assert_eq!(report.existing, vec!["samtools-env"]);

        let lines = runner.lines();
        assert!(lines[0].starts_with("adduser"));
        assert!(lines[1].starts_with("wget -N https://github.com/conda-forge"));
        assert!(lines[2].starts_with("bash "));
        assert!(lines[3].ends_with("bin/conda init"));
        assert!(lines[4].contains("mamba update -p"));
        assert!(lines[5].contains("mamba install -p"));
        assert!(lines[6].ends_with("mamba info --envs"));
        assert_eq!(lines.len(), 9);

        assert!(fx.system_bashrc().contains("# --- Added by SEISbio"));
        assert_eq!(
            provisioner.timeline().result_of(Stage::SystemPackages),
            Some(&StageResult::Skipped("not requested".to_string()))
        );
    }

    #[test]
    fn test_demoted_commands_carry_home_and_identity() {
        let fx = Fixture::new();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[]);

        Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .run()
            .unwrap();

        let home = fx.home().display().to_string();
        for call in runner.calls().iter().skip(1) {
            assert!(call.identity.is_some(), "not demoted: {call}");
            assert_eq!(call.env.get("HOME"), Some(&home));
            assert_eq!(call.current_dir.as_deref(), Some(fx.home().as_path()));
            assert!(call.timeout.is_some());
        }
    }

    #[test]
    fn test_existing_account_only_prompts() {
        let fx = Fixture::new();
        fx.create_home();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[true]);

        let status = Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .ensure_account()
            .unwrap();

        assert!(matches!(status, AccountStatus::Existing(_)));
        assert_eq!(runner.count("adduser"), 0);
        assert_eq!(prompter.questions.len(), 1);
    }

    #[test]
    fn test_existing_account_declined_ends_run() {
        let fx = Fixture::new();
        fx.create_home();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[false]);

        let outcome = Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .run()
            .unwrap();

        assert_eq!(outcome, Outcome::Declined);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_invalid_answer_is_fatal() {
        let fx = Fixture::new();
        fx.create_home();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::default().then_invalid("maybe");

        let mut provisioner = Provisioner::new(fx.settings.clone(), &runner, &mut prompter);
        let err = provisioner.run().unwrap_err();

        assert!(matches!(err, ProvisionError::InvalidAnswer(_)));
        assert_eq!(
            provisioner.timeline().result_of(Stage::Account),
            Some(&StageResult::Failed)
        );
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_existing_distribution_skips_install_and_merge() {
        let fx = Fixture::new();
        fx.create_home();
        fx.create_prefix();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[]);

        let ctx = RunAs::new(fx.home(), None);
        let status = Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .ensure_distribution(&ctx)
            .unwrap();

        assert_eq!(status, DistributionStatus::AlreadyInstalled);
        assert!(runner.calls().is_empty());
        assert_eq!(fx.system_bashrc(), "# system defaults\n");
        assert!(!backup_path(&fx.settings.system_bashrc).exists());
    }

    #[test]
    fn test_existing_distribution_prompts_before_update() {
        let fx = Fixture::new();
        fx.create_home();
        fx.create_prefix();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[true, false]);

        let mut provisioner = Provisioner::new(fx.settings.clone(), &runner, &mut prompter);
        let outcome = provisioner.run().unwrap();

        assert!(matches!(outcome, Outcome::Completed(_)));
        assert_eq!(runner.count("update -p"), 0);
        assert_eq!(runner.count("install -p"), 0);
        assert_eq!(runner.count("create -n"), 2);
        assert_eq!(
            provisioner.timeline().result_of(Stage::BaseEnvironment),
            Some(&StageResult::Declined)
        );
    }

    #[test]
    fn test_missing_init_block_aborts_without_touching_system_file() {
        let fx = Fixture::new();
        let runner = fx.runner("alias ll='ls -l'\n");
        let mut prompter = ScriptedPrompter::new(&[]);

        let err = Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .run()
            .unwrap_err();

        assert!(matches!(err, ProvisionError::MissingShellInit(_)));
        assert_eq!(fx.system_bashrc(), "# system defaults\n");
        assert_eq!(runner.count("update -p"), 0);
        assert!(creates_for(&runner).is_empty());
    }

    #[test]
    fn test_existing_env_not_recreated() {
        let fx = Fixture::new();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[]);
        let specs = vec![PackageSpec::new("samtools"), PackageSpec::new("samtools=1.17")];

        let ctx = RunAs::new(fx.home(), None);
        let report = Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .create_tool_envs(&ctx, &specs)
            .unwrap();

        assert_eq!(report.existing, vec!["samtools-env"]);
        assert_eq!(report.created, vec!["samtools117-env"]);
        let creates = creates_for(&runner);
        assert_eq!(creates.len(), 1);
        assert!(creates[0].has_arg("samtools=1.17"));
    }

    #[test]
    fn test_hicexplorer_env_gets_companion() {
        let fx = Fixture::new();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[]);

        let ctx = RunAs::new(fx.home(), None);
        Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .create_tool_envs(&ctx, &[PackageSpec::new("hicexplorer")])
            .unwrap();

        let creates = creates_for(&runner);
        assert_eq!(creates.len(), 1);
        assert!(creates[0].has_arg("hicexplorer"));
        assert!(creates[0].has_arg("hic2cool"));
    }

    #[test]
    fn test_duplicate_specs_create_once() {
        let fx = Fixture::new();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[]);
        let specs = vec![PackageSpec::new("bwa"), PackageSpec::new("bwa")];

        let ctx = RunAs::new(fx.home(), None);
        let report = Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .create_tool_envs(&ctx, &specs)
            .unwrap();

        assert_eq!(report.created, vec!["bwa-env"]);
        assert_eq!(report.existing, vec!["bwa-env"]);
    }

    #[test]
    fn test_command_failure_stops_pipeline() {
        let fx = Fixture::new();
        let runner = fx.runner(&init_bashrc()).failing("wget");
        let mut prompter = ScriptedPrompter::new(&[]);

        let mut provisioner = Provisioner::new(fx.settings.clone(), &runner, &mut prompter);
        let err = provisioner.run().unwrap_err();

        assert!(matches!(err, ProvisionError::CommandFailed { .. }));
        let installer_runs = runner
            .calls()
            .iter()
            .filter(|c| c.program == "bash")
            .count();
        assert_eq!(installer_runs, 0);
        assert_eq!(
            provisioner.timeline().result_of(Stage::Distribution),
            Some(&StageResult::Failed)
        );
    }

    #[test]
    fn test_os_packages_run_first() {
        let fx = Fixture::new();
        let mut settings = fx.settings.clone();
        settings.install_os_packages = true;
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[]);

        Provisioner::new(settings, &runner, &mut prompter).run().unwrap();

        let lines = runner.lines();
        assert_eq!(lines[0], "apt update");
        assert!(lines[1].starts_with("apt install -y"));
        assert!(lines[3].starts_with("adduser"));
    }

    #[test]
    fn test_bad_package_list_fails_before_any_command() {
        let fx = Fixture::new();
        fs::write(&fx.settings.package_list, "samtools bwa\n").unwrap();
        let runner = fx.runner(&init_bashrc());
        let mut prompter = ScriptedPrompter::new(&[]);

        let err = Provisioner::new(fx.settings.clone(), &runner, &mut prompter)
            .run()
            .unwrap_err();

        assert!(matches!(err, ProvisionError::PackageList { line: 1, .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_local_install_skips_account_and_system_bashrc() {
        let fx = Fixture::new();
        let local_home = fx.settings.home_root.join("alice");
        fs::create_dir(&local_home).unwrap();

        let mut settings = fx.settings.clone();
        settings.mode = InstallMode::Local {
            home: local_home.clone(),
        };

        let prefix = settings.prefix();
        let runner = RecordingRunner::new()
            .with_output("info --envs", LISTING)
            .on("-b -p", move |_| fs::create_dir_all(&prefix).unwrap());
        let mut prompter = ScriptedPrompter::new(&[]);

        Provisioner::new(settings, &runner, &mut prompter).run().unwrap();

        assert_eq!(runner.count("adduser"), 0);
        assert!(runner.calls().iter().all(|c| c.identity.is_none()));
        assert_eq!(fx.system_bashrc(), "# system defaults\n");
        assert!(Path::new(&local_home).join("mambaforge").exists());
    }
}
