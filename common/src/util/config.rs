use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detailed_routing: DetailedRoutingConfig,
    #[serde(default)]
    pub input: InputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detailed_routing: DetailedRoutingConfig::default(),
            input: InputConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetailedRoutingConfig {
    #[serde(default = "default_rrr_iter_limit")]
    pub rrr_iter_limit: usize,
    #[serde(default = "default_rrr_init_vio_cost_discount")]
    pub rrr_init_vio_cost_discount: f64,
    #[serde(default = "default_rrr_fade_coeff")]
    pub rrr_fade_coeff: f64,
    #[serde(default = "default_guide_expand")]
    pub default_guide_expand: i32,
    #[serde(default = "default_guide_expand_iter_limit")]
    pub guide_expand_iter_limit: usize,
    #[serde(default = "default_wrong_way_point_density")]
    pub wrong_way_point_density: f64,
    #[serde(default = "default_wrong_way_penalty_coeff")]
    pub wrong_way_penalty_coeff: f64,
    #[serde(default = "default_weight_wirelength")]
    pub weight_wirelength: f64,
    #[serde(default = "default_weight_via")]
    pub weight_via: f64,
    #[serde(default = "default_weight_short")]
    pub weight_short: f64,
    #[serde(default = "default_weight_space")]
    pub weight_space: f64,
    #[serde(default = "default_weight_min_area")]
    pub weight_min_area: f64,
    #[serde(default = "default_poor_wire_penalty_coeff")]
    pub poor_wire_penalty_coeff: f64,
    #[serde(default = "default_poor_via_penalty_coeff")]
    pub poor_via_penalty_coeff: f64,
    #[serde(default = "default_nondefault_via_penalty_coeff")]
    pub nondefault_via_penalty_coeff: f64,
    /// 0 routes one net per batch on the global pool.
    #[serde(default)]
    pub num_threads: usize,
    #[serde(default)]
    pub schedule_assign_back_ratio: f64,
    #[serde(default = "default_true")]
    pub schedule_sort_within_batch: bool,
    #[serde(default)]
    pub schedule_reverse: bool,
    #[serde(default = "default_warn_cap")]
    pub warn_cap: usize,
    #[serde(default)]
    pub write_each_iter: bool,
}

impl Default for DetailedRoutingConfig {
    fn default() -> Self {
        Self {
            rrr_iter_limit: default_rrr_iter_limit(),
            rrr_init_vio_cost_discount: default_rrr_init_vio_cost_discount(),
            rrr_fade_coeff: default_rrr_fade_coeff(),
            default_guide_expand: default_guide_expand(),
            guide_expand_iter_limit: default_guide_expand_iter_limit(),
            wrong_way_point_density: default_wrong_way_point_density(),
            wrong_way_penalty_coeff: default_wrong_way_penalty_coeff(),
            weight_wirelength: default_weight_wirelength(),
            weight_via: default_weight_via(),
            weight_short: default_weight_short(),
            weight_space: default_weight_space(),
            weight_min_area: default_weight_min_area(),
            poor_wire_penalty_coeff: default_poor_wire_penalty_coeff(),
            poor_via_penalty_coeff: default_poor_via_penalty_coeff(),
            nondefault_via_penalty_coeff: default_nondefault_via_penalty_coeff(),
            num_threads: 0,
            schedule_assign_back_ratio: 0.0,
            schedule_sort_within_batch: default_true(),
            schedule_reverse: false,
            warn_cap: default_warn_cap(),
            write_each_iter: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_design_file")]
    pub design_file: String,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_image_file")]
    pub image_file: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            design_file: default_design_file(),
            output_file: default_output_file(),
            image_file: default_image_file(),
        }
    }
}

fn default_rrr_iter_limit() -> usize {
    4
}

fn default_rrr_init_vio_cost_discount() -> f64 {
    0.1
}

fn default_rrr_fade_coeff() -> f64 {
    0.01
}

fn default_guide_expand() -> i32 {
    2
}

fn default_guide_expand_iter_limit() -> usize {
    9
}

fn default_wrong_way_point_density() -> f64 {
    0.1
}

fn default_wrong_way_penalty_coeff() -> f64 {
    4.0
}

fn default_weight_wirelength() -> f64 {
    0.5
}

fn default_weight_via() -> f64 {
    2.0
}

fn default_weight_short() -> f64 {
    500.0
}

fn default_weight_space() -> f64 {
    500.0
}

fn default_weight_min_area() -> f64 {
    500.0
}

fn default_poor_wire_penalty_coeff() -> f64 {
    8.0
}

fn default_poor_via_penalty_coeff() -> f64 {
    8.0
}

fn default_nondefault_via_penalty_coeff() -> f64 {
    0.005
}

fn default_true() -> bool {
    true
}

fn default_warn_cap() -> usize {
    5
}

fn default_design_file() -> String {
    "inputs/demo.toml".to_string()
}

fn default_output_file() -> String {
    "output/routed.txt".to_string()
}

fn default_image_file() -> String {
    "output/routed.png".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = toml::from_str("[detailed_routing]\nrrr_iter_limit = 7\n").unwrap();
        assert_eq!(cfg.detailed_routing.rrr_iter_limit, 7);
        assert_eq!(cfg.detailed_routing.default_guide_expand, 2);
        assert!(cfg.detailed_routing.schedule_sort_within_batch);
        assert_eq!(cfg.input.output_file, "output/routed.txt");
    }
}
