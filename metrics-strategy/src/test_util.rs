use std::sync::Arc;

use mockall::mock;

use crate::catalogue::Registerer;
use crate::common::Error;
use crate::instrument::Collector;

mock! {
    pub TestRegisterer {}

    impl Registerer for TestRegisterer {
        fn register(&self, collector: Arc<dyn Collector>) -> Result<(), Error>;
    }
}
