//! Unit tests for DatabaseCluster spec helpers
//!
//! Tests secret name defaulting, the derived security profile and
//! `DatabaseClusterSpec::validate()`.

#[cfg(test)]
mod database_cluster_spec {
    use crate::crd::{
        AuthenticationSpec, DatabaseCluster, DatabaseClusterSpec, DeploymentSecurityProfile,
        EncryptionSpec, MetricsSpec, RocksDbSpec, SyncSpec, TlsSpec, SECRET_NAME_NONE,
    };

    fn cluster(spec: DatabaseClusterSpec) -> DatabaseCluster {
        DatabaseCluster::new("example", spec)
    }

    #[test]
    fn test_default_spec_enables_auth_and_tls() {
        let profile = DeploymentSecurityProfile::from_spec(&DatabaseClusterSpec::default());
        assert!(profile.auth_enabled);
        assert!(profile.tls_enabled);
        assert!(!profile.encryption_enabled);
        assert!(!profile.metrics_enabled);
        assert!(!profile.sync_enabled);
    }

    #[test]
    fn test_none_secret_name_disables_features() {
        let spec = DatabaseClusterSpec {
            authentication: AuthenticationSpec {
                jwt_secret_name: Some(SECRET_NAME_NONE.to_string()),
            },
            tls: TlsSpec {
                ca_secret_name: Some(SECRET_NAME_NONE.to_string()),
                ca_ttl_days: None,
            },
            ..Default::default()
        };
        let profile = DeploymentSecurityProfile::from_spec(&spec);
        assert!(!profile.auth_enabled);
        assert!(!profile.tls_enabled);
    }

    #[test]
    fn test_default_secret_names() {
        let c = cluster(DatabaseClusterSpec::default());
        assert_eq!(c.jwt_secret_name(), "example-jwt");
        assert_eq!(c.tls_ca_secret_name(), "example-ca");
        assert_eq!(c.sync_jwt_secret_name(), "example-sync-jwt");
        assert_eq!(c.sync_monitoring_secret_name(), "example-sync-mt");
        assert_eq!(c.sync_tls_ca_secret_name(), "example-sync-ca");
        assert_eq!(c.sync_client_ca_secret_name(), "example-sync-client-auth-ca");
        assert_eq!(c.exporter_token_secret_name(), "example-exporter-jwt-token");
        assert_eq!(c.keyfolder_secret_name(), "example-encryption-folder");
        assert_eq!(c.encryption_key_secret_name(), None);
    }

    #[test]
    fn test_explicit_secret_names_win() {
        let c = cluster(DatabaseClusterSpec {
            authentication: AuthenticationSpec {
                jwt_secret_name: Some("custom-jwt".to_string()),
            },
            metrics: MetricsSpec {
                enabled: true,
                jwt_token_secret_name: Some("custom-exporter".to_string()),
            },
            rocksdb: RocksDbSpec {
                encryption: EncryptionSpec {
                    key_secret_name: Some("my-keyfile".to_string()),
                },
            },
            ..Default::default()
        });
        assert_eq!(c.jwt_secret_name(), "custom-jwt");
        assert_eq!(c.exporter_token_secret_name(), "custom-exporter");
        assert_eq!(c.encryption_key_secret_name().as_deref(), Some("my-keyfile"));
        assert!(c.security_profile().encryption_enabled);
    }

    #[test]
    fn test_empty_encryption_secret_name_is_not_encrypted() {
        let spec = DatabaseClusterSpec {
            rocksdb: RocksDbSpec {
                encryption: EncryptionSpec {
                    key_secret_name: Some(String::new()),
                },
            },
            ..Default::default()
        };
        assert!(!spec.rocksdb.is_encrypted());
    }

    #[test]
    fn test_sync_requires_authentication() {
        let spec = DatabaseClusterSpec {
            authentication: AuthenticationSpec {
                jwt_secret_name: Some(SECRET_NAME_NONE.to_string()),
            },
            sync: SyncSpec {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = spec.validate().unwrap_err();
        assert!(err.contains("authentication"));
    }

    #[test]
    fn test_sync_with_defaults_is_valid() {
        let spec = DatabaseClusterSpec {
            sync: SyncSpec {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(spec.validate().is_ok());
    }

    fn tls_with_ttl(ttl: u32) -> TlsSpec {
        TlsSpec {
            ca_secret_name: None,
            ca_ttl_days: Some(ttl),
        }
    }

    #[test]
    fn test_ca_ttl_past_last_encodable_year_is_rejected() {
        let spec = DatabaseClusterSpec {
            tls: tls_with_ttl(3_000_000),
            ..Default::default()
        };
        let err = spec.validate().unwrap_err();
        assert!(err.starts_with("spec.tls.caTtlDays"), "{err}");

        let spec = DatabaseClusterSpec {
            sync: SyncSpec {
                enabled: true,
                tls: tls_with_ttl(u32::MAX),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = spec.validate().unwrap_err();
        assert!(err.starts_with("spec.sync.tls.caTtlDays"), "{err}");
    }

    #[test]
    fn test_large_but_encodable_ca_ttl_is_valid() {
        let spec = DatabaseClusterSpec {
            tls: tls_with_ttl(365 * 100),
            ..Default::default()
        };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_ttl_of_disabled_tls_is_ignored() {
        let spec = DatabaseClusterSpec {
            tls: TlsSpec {
                ca_secret_name: Some(SECRET_NAME_NONE.to_string()),
                ca_ttl_days: Some(u32::MAX),
            },
            ..Default::default()
        };
        assert!(spec.validate().is_ok());
    }
}

#[cfg(test)]
mod database_backup_status {
    use crate::crd::{BackupState, DatabaseBackupStatus};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_transition_time_round_trips_rfc3339() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let status = DatabaseBackupStatus::new(BackupState::DownloadError, t, "download failed");
        assert_eq!(status.transition_time(), Some(t));
    }

    #[test]
    fn test_garbage_transition_time_is_none() {
        let status = DatabaseBackupStatus {
            state: BackupState::Pending,
            time: "yesterday".to_string(),
            message: String::new(),
        };
        assert_eq!(status.transition_time(), None);
    }

    #[test]
    fn test_state_serializes_as_name() {
        let json = serde_json::to_string(&BackupState::DownloadError).unwrap();
        assert_eq!(json, "\"DownloadError\"");
    }
}
