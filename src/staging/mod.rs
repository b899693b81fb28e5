//! Artifact staging
//!
//! Uploads everything the coordinator needs into
//! `<staging root>/<applicationId>/` on the shared store and records what
//! was registered as a local resource. Staging happens once per
//! application id; a failed copy aborts and leaves whatever was already
//! uploaded behind.

mod manifest;

pub use manifest::{ManifestEntry, StagedManifest};

use std::path::Path;

use tracing::info;
use xlaunch_protocol::ops::ResourceKind;
use xlaunch_protocol::ApplicationId;

use crate::cache::ResolvedCache;
use crate::config::EffectiveConfig;
use crate::error::{LaunchError, LaunchResult};
use crate::fs::{RemotePath, SharedFs};
use crate::job::JobSpec;

/// Staged name of the persisted job configuration.
pub const JOB_CONF_NAME: &str = "job.json";

/// Staged name of the coordinator package.
pub const APP_JAR_NAME: &str = "AppMaster.jar";

/// Mode of files the launcher writes itself.
pub const JOB_FILE_PERMISSION: u32 = 0o644;

/// Everything staging produced for one application.
#[derive(Debug, Clone)]
pub struct StagedArtifacts {
    pub staging_dir: RemotePath,
    pub job_conf: RemotePath,
    pub app_jar: RemotePath,
    /// Remote locations of user files, in the order given.
    pub files: Vec<String>,
    /// Remote locations of library jars, in the order given.
    pub lib_jars: Vec<String>,
    /// Jar file names, for the classpath.
    pub lib_jar_names: Vec<String>,
    pub manifest: StagedManifest,
}

pub struct ArtifactStager<'a> {
    fs: &'a dyn SharedFs,
    staging_root: RemotePath,
}

impl<'a> ArtifactStager<'a> {
    pub fn new(fs: &'a dyn SharedFs, staging_root: &str) -> Self {
        let staging_root = fs.qualify(&RemotePath::parse(staging_root));
        Self { fs, staging_root }
    }

    /// Per-application staging directory.
    pub fn staging_dir(&self, app_id: &ApplicationId) -> RemotePath {
        self.staging_root.join(&app_id.to_string())
    }

    pub fn stage(
        &self,
        app_id: &ApplicationId,
        spec: &JobSpec,
        config: &EffectiveConfig,
        cache: &ResolvedCache,
    ) -> LaunchResult<StagedArtifacts> {
        check_reserved_names(spec)?;
        let staging_dir = self.staging_dir(app_id);
        let mut manifest = StagedManifest::new();

        let job_conf = self.write_job_conf(&staging_dir, app_id, config, JOB_FILE_PERMISSION)?;
        manifest.register(
            self.fs,
            JOB_CONF_NAME,
            job_conf.clone(),
            ResourceKind::File,
            Some(JOB_FILE_PERMISSION),
        )?;

        let app_jar = staging_dir.join(APP_JAR_NAME);
        info!("Copying {} to remote path {}", spec.app_jar.display(), app_jar);
        self.fs.copy_from_local(&spec.app_jar, &app_jar)?;
        manifest.register(self.fs, APP_JAR_NAME, app_jar.clone(), ResourceKind::File, None)?;

        let files = self.stage_user_files(&staging_dir, spec, &mut manifest)?;
        let (lib_jars, lib_jar_names) = self.stage_lib_jars(&staging_dir, spec, &mut manifest)?;

        if spec.materializes_cache() {
            for entry in cache.iter() {
                manifest.register(self.fs, entry.alias.clone(), entry.remote.clone(), entry.kind, None)?;
            }
        }

        Ok(StagedArtifacts {
            staging_dir,
            job_conf,
            app_jar,
            files,
            lib_jars,
            lib_jar_names,
            manifest,
        })
    }

    fn write_job_conf(
        &self,
        staging_dir: &RemotePath,
        app_id: &ApplicationId,
        config: &EffectiveConfig,
        permission: u32,
    ) -> LaunchResult<RemotePath> {
        let path = staging_dir.join(JOB_CONF_NAME);
        let persisted = config.redacted().with_application_id(app_id.to_string());
        let json = persisted.to_json()?;
        self.fs.create_with_permissions(&path, json.as_bytes(), permission)?;
        info!("Wrote job configuration to {}", path);
        Ok(path)
    }

    fn stage_user_files(
        &self,
        staging_dir: &RemotePath,
        spec: &JobSpec,
        manifest: &mut StagedManifest,
    ) -> LaunchResult<Vec<String>> {
        let mut remotes = Vec::with_capacity(spec.files.len());
        if spec.files.is_empty() {
            return Ok(remotes);
        }

        info!("Copy user files from local filesystem to remote");
        for file in &spec.files {
            let name = base_name(file)?;
            let dest = staging_dir.join(&name);
            info!("Copying {} to remote path {}", file.display(), dest);
            self.fs.copy_from_local(file, &dest)?;

            if spec.materializes_user_files() {
                manifest.register(self.fs, name, dest.clone(), ResourceKind::File, None)?;
            }
            remotes.push(dest.to_string());
        }
        Ok(remotes)
    }

    fn stage_lib_jars(
        &self,
        staging_dir: &RemotePath,
        spec: &JobSpec,
        manifest: &mut StagedManifest,
    ) -> LaunchResult<(Vec<String>, Vec<String>)> {
        let mut remotes = Vec::with_capacity(spec.lib_jars.len());
        let mut names = Vec::with_capacity(spec.lib_jars.len());
        if spec.lib_jars.is_empty() {
            return Ok((remotes, names));
        }

        info!("Copy lib jars from local filesystem to remote");
        for jar in &spec.lib_jars {
            let source = RemotePath::parse(jar);
            let remote = if source.is_remote() {
                if !self.fs.exists(&source)? {
                    return Err(LaunchError::PathNotFound {
                        what: "Lib jar",
                        path: jar.clone(),
                    });
                }
                source
            } else {
                let local = Path::new(source.path());
                let dest = staging_dir.join(&base_name(local)?);
                info!("Copying {} to remote path {}", jar, dest);
                self.fs.copy_from_local(local, &dest)?;
                dest
            };

            let name = remote.file_name().to_string();
            manifest.register(self.fs, name.clone(), remote.clone(), ResourceKind::File, None)?;
            remotes.push(remote.to_string());
            names.push(name);
        }
        Ok((remotes, names))
    }
}

/// User files and lib jars share the staging directory with the launcher's
/// own files and must not take their names.
fn check_reserved_names(spec: &JobSpec) -> LaunchResult<()> {
    let files = spec.files.iter().map(|file| base_name(file));
    let jars = spec.lib_jars.iter().map(|jar| {
        let source = RemotePath::parse(jar);
        if source.is_remote() {
            Ok(source.file_name().to_string())
        } else {
            base_name(Path::new(source.path()))
        }
    });

    for name in files.chain(jars) {
        let name = name?;
        if name == JOB_CONF_NAME || name == APP_JAR_NAME {
            return Err(LaunchError::InvalidArgument(format!(
                "'{}' is reserved for the launcher's own staged files",
                name
            )));
        }
    }
    Ok(())
}

fn base_name(path: &Path) -> LaunchResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| LaunchError::InvalidArgument(format!("'{}' has no file name", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::fs::MountedFs;
    use crate::job::{AppType, ResourceAsk};
    use tempfile::TempDir;

    struct Fixture {
        _store_root: TempDir,
        local: TempDir,
        store: MountedFs,
    }

    impl Fixture {
        fn new() -> Self {
            let store_root = TempDir::new().unwrap();
            let local = TempDir::new().unwrap();
            std::fs::write(local.path().join("am.jar"), b"jar").unwrap();
            std::fs::write(local.path().join("train.py"), b"print(1)").unwrap();
            std::fs::write(local.path().join("dep.jar"), b"dep").unwrap();
            let store = MountedFs::new(store_root.path(), "hdfs://nn:8020");
            Self {
                _store_root: store_root,
                local,
                store,
            }
        }

        fn path(&self, name: &str) -> std::path::PathBuf {
            self.local.path().join(name)
        }
    }

    fn config() -> EffectiveConfig {
        EffectiveConfig::build(None, None, None).unwrap()
    }

    #[test]
    fn test_stage_basic() {
        let fx = Fixture::new();
        let stager = ArtifactStager::new(&fx.store, "/tmp/staging");
        let spec = JobSpec::builder(AppType::Tensorflow, fx.path("am.jar"))
            .files(vec![fx.path("train.py")])
            .lib_jars(vec![fx.path("dep.jar").display().to_string()])
            .build();
        let app_id = ApplicationId::new(1, 1);

        let staged = stager
            .stage(&app_id, &spec, &config(), &ResolvedCache::default())
            .unwrap();

        assert_eq!(
            staged.staging_dir.to_string(),
            "hdfs://nn:8020/tmp/staging/application_1_0001"
        );
        assert!(fx.store.exists(&staged.job_conf).unwrap());
        assert!(fx.store.exists(&staged.app_jar).unwrap());
        assert_eq!(
            staged.files,
            vec!["hdfs://nn:8020/tmp/staging/application_1_0001/train.py"]
        );
        assert_eq!(staged.lib_jar_names, vec!["dep.jar"]);

        // TensorFlow never materializes user files per container
        let names: Vec<&str> = staged.manifest.names().collect();
        assert_eq!(names, vec![APP_JAR_NAME, "dep.jar", JOB_CONF_NAME]);
        assert_eq!(
            staged.manifest.get(JOB_CONF_NAME).unwrap().permission,
            Some(JOB_FILE_PERMISSION)
        );
    }

    #[test]
    fn test_job_conf_is_redacted_and_tagged() {
        let fx = Fixture::new();
        let stager = ArtifactStager::new(&fx.store, "/staging");
        let spec = JobSpec::builder(AppType::Caffe, fx.path("am.jar")).build();
        let mut cfg = config();
        cfg.set("fs.token", "abc");

        let staged = stager
            .stage(&ApplicationId::new(9, 3), &spec, &cfg, &ResolvedCache::default())
            .unwrap();

        let local = fx.store.local_path(&staged.job_conf).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(local).unwrap()).unwrap();
        assert_eq!(written["config"]["fs"]["token"], "[REDACTED]");
        assert_eq!(written["application_id"], "application_9_0003");
    }

    #[test]
    fn test_mxnet_distributed_materializes_files_and_cache() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.store.root().join("shared")).unwrap();
        std::fs::write(fx.store.root().join("shared/dict.txt"), b"d").unwrap();
        let stager = ArtifactStager::new(&fx.store, "/staging");
        let spec = JobSpec::builder(AppType::Mxnet, fx.path("am.jar"))
            .ps(ResourceAsk::new(1024, 1, 1))
            .files(vec![fx.path("train.py")])
            .build();
        let cache = ResolvedCache {
            files: vec![CacheEntry {
                remote: RemotePath::parse("hdfs://nn:8020/shared/dict.txt"),
                alias: "dict".to_string(),
                kind: ResourceKind::File,
            }],
            archives: Vec::new(),
        };

        let staged = stager
            .stage(&ApplicationId::new(1, 2), &spec, &config(), &cache)
            .unwrap();

        assert!(staged.manifest.get("train.py").is_some());
        assert_eq!(staged.manifest.get("dict").unwrap().kind, ResourceKind::File);
    }

    #[test]
    fn test_user_file_with_reserved_name_is_rejected() {
        let fx = Fixture::new();
        std::fs::write(fx.path(JOB_CONF_NAME), b"{}").unwrap();
        let stager = ArtifactStager::new(&fx.store, "/staging");
        let spec = JobSpec::builder(AppType::Tensorflow, fx.path("am.jar"))
            .files(vec![fx.path(JOB_CONF_NAME)])
            .build();
        let app_id = ApplicationId::new(1, 4);

        let err = stager
            .stage(&app_id, &spec, &config(), &ResolvedCache::default())
            .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidArgument(ref msg) if msg.contains(JOB_CONF_NAME)));
        // Nothing is uploaded
        assert!(!fx.store.exists(&stager.staging_dir(&app_id).join(JOB_CONF_NAME)).unwrap());
    }

    #[test]
    fn test_lib_jar_with_reserved_name_is_rejected() {
        let fx = Fixture::new();
        let stager = ArtifactStager::new(&fx.store, "/staging");
        let app_id = ApplicationId::new(1, 5);

        std::fs::write(fx.path(APP_JAR_NAME), b"not the coordinator").unwrap();
        let local = JobSpec::builder(AppType::Mxnet, fx.path("am.jar"))
            .lib_jars(vec![fx.path(APP_JAR_NAME).display().to_string()])
            .build();
        let err = stager
            .stage(&app_id, &local, &config(), &ResolvedCache::default())
            .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidArgument(ref msg) if msg.contains(APP_JAR_NAME)));

        let remote = JobSpec::builder(AppType::Mxnet, fx.path("am.jar"))
            .lib_jars(vec![format!("hdfs://nn:8020/libs/{}", APP_JAR_NAME)])
            .build();
        let err = stager
            .stage(&app_id, &remote, &config(), &ResolvedCache::default())
            .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_remote_jar() {
        let fx = Fixture::new();
        let stager = ArtifactStager::new(&fx.store, "/staging");
        let spec = JobSpec::builder(AppType::Tensorflow, fx.path("am.jar"))
            .lib_jars(vec!["hdfs://nn:8020/libs/missing.jar".to_string()])
            .build();

        let err = stager
            .stage(&ApplicationId::new(1, 3), &spec, &config(), &ResolvedCache::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PathNotFound);
    }

    #[test]
    fn test_remote_jar_is_referenced_not_copied() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.store.root().join("libs")).unwrap();
        std::fs::write(fx.store.root().join("libs/shared.jar"), b"s").unwrap();
        let stager = ArtifactStager::new(&fx.store, "/staging");
        let spec = JobSpec::builder(AppType::Tensorflow, fx.path("am.jar"))
            .lib_jars(vec!["hdfs://nn:8020/libs/shared.jar".to_string()])
            .build();

        let staged = stager
            .stage(&ApplicationId::new(1, 4), &spec, &config(), &ResolvedCache::default())
            .unwrap();
        assert_eq!(staged.lib_jars, vec!["hdfs://nn:8020/libs/shared.jar"]);
        assert!(!fx
            .store
            .exists(&staged.staging_dir.join("shared.jar"))
            .unwrap());
    }
}
