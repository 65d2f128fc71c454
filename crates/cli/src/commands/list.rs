use serde::Serialize;
use veri::{AppProfile, Scenario, Viewport, app};

use crate::error::Result;
use crate::output::{self, OutputFormat, ResultBuilder};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinInfo {
	pub name: String,
	pub description: String,
	pub steps: usize,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub tags: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub viewport: Option<Viewport>,
}

impl From<&Scenario> for BuiltinInfo {
	fn from(scenario: &Scenario) -> Self {
		Self {
			name: scenario.name.clone(),
			description: scenario.description.clone(),
			steps: scenario.steps.len(),
			tags: scenario.tags.clone(),
			viewport: scenario.viewport,
		}
	}
}

pub fn builtins(profile: &AppProfile) -> Vec<BuiltinInfo> {
	app::catalogue(profile).iter().map(BuiltinInfo::from).collect()
}

pub fn execute(format: OutputFormat) -> Result<i32> {
	let infos = builtins(&AppProfile::crypto3());

	if format == OutputFormat::Text {
		let width = infos.iter().map(|i| i.name.len()).max().unwrap_or(0);
		for info in &infos {
			println!("{:width$}  {}", info.name, info.description);
		}
		return Ok(0);
	}

	let result = ResultBuilder::new("list").data(infos).build();
	output::print_result(&result, format);
	Ok(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lists_the_whole_catalogue_in_order() {
		let infos = builtins(&AppProfile::crypto3());
		let names: Vec<_> = infos.iter().map(|i| i.name.as_str()).collect();
		assert_eq!(names, app::BUILTIN_NAMES);
		assert!(infos.iter().all(|i| i.steps > 0 && !i.description.is_empty()));
	}

	#[test]
	fn mobile_scenario_reports_its_viewport() {
		let infos = builtins(&AppProfile::crypto3());
		let mobile = infos.iter().find(|i| i.name == "mobile-nav-labels").unwrap();
		assert_eq!(mobile.viewport, Some(Viewport::MOBILE));
	}
}
