pub mod clock;
pub mod configmap;
pub mod echo;
pub mod sonar;

pub use configmap::{ConfigMapStore, KubeConfigMaps, DEFAULT_NAMESPACE};
pub use echo::{EchoBlueprint, EchoError, EchoResponse, ECHO_PATH};
pub use sonar::{
    append_sonar_line, SonarBlueprint, SonarError, SonarResponse, DATA_KEY, SONAR_PATH,
};
