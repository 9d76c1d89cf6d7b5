use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::io::Write;

use crate::{SimReport, TbError};

impl SimReport {
    /// Writes the run as a JUnit XML test suite named `suite`.
    pub fn write_junit<W: Write>(&self, suite: &str, sink: W) -> Result<(), TbError> {
        let test_cases: Vec<_> = self
            .tests
            .iter()
            .map(|t| {
                let time = Duration::seconds_f64(t.time_secs);
                match &t.result {
                    Ok(_) => TestCaseBuilder::success(&t.name, time),
                    Err(e) => TestCaseBuilder::failure(&t.name, time, "failure", &e.to_string()),
                }
                .build()
            })
            .collect();

        let test_suite = TestSuiteBuilder::new(suite)
            .add_testcases(test_cases)
            .build();
        let report = ReportBuilder::new().add_testsuite(test_suite).build();
        report
            .write_xml(sink)
            .map_err(|e| TbError::Report(format!("{:?}", e)))
    }
}
