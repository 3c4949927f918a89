// ABOUTME: YAML site configuration - loads a full SiteConfig and builds a validated SiteDefinition
// ABOUTME: serde derive, load_from_file/save_to_file, Default

use serde::{Deserialize, Serialize};

use crate::engine::error::{SimError, SimResult};
use crate::engine::site::vegetation::CurveParams;
use crate::engine::site::{
    derive_layer, CanopyHeight, Co2Coeffs, GlobalParams, HydRedParams, InterceptionParams, Layer,
    LayerSpec, SiteDefinition, ThresholdMode, TranspirationRegions, VegKind, VegType, N_VEG,
};
use crate::engine::core::retention::{estimate_campbell_cosby1984, estimate_campbell_saxton2006};
use crate::engine::core::Swrc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub name: String,
    pub author: String,
    pub description: Option<String>,
    pub version: String,
}

impl Default for SiteMetadata {
    fn default() -> Self {
        Self {
            name: "Unnamed dryland site".to_string(),
            author: "Unknown".to_string(),
            description: None,
            version: "1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwrcConfig {
    Campbell1974 { psi_s: f64, theta_s: f64, b: f64 },
    VanGenuchten1980 { theta_r: f64, theta_s: f64, alpha: f64, n: f64 },
    /// Estimate Campbell 1974 parameters from this layer's sand/clay via the
    /// Cosby et al. 1984 PTF; this is also what a `null` `swrc` falls back to.
    EstimateCosby1984,
    /// Cosby 1984 shape (`psi_s`, `b`) with saturated theta instead taken
    /// from the Saxton et al. 2006 regression (SPEC_FULL Sec 5 supplement).
    EstimateSaxton2006,
}

impl SwrcConfig {
    fn resolve(self, sand: f64, clay: f64) -> Swrc {
        match self {
            SwrcConfig::Campbell1974 { psi_s, theta_s, b } => Swrc::campbell(psi_s, theta_s, b),
            SwrcConfig::VanGenuchten1980 { theta_r, theta_s, alpha, n } => {
                Swrc::van_genuchten(theta_r, theta_s, alpha, n)
            }
            SwrcConfig::EstimateCosby1984 => estimate_campbell_cosby1984(sand, clay),
            SwrcConfig::EstimateSaxton2006 => estimate_campbell_saxton2006(sand, clay),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ThresholdModeConfig {
    FixedSwp(f64),
    FixedVwc(f64),
    Residual,
}

impl From<ThresholdModeConfig> for ThresholdMode {
    fn from(cfg: ThresholdModeConfig) -> Self {
        match cfg {
            ThresholdModeConfig::FixedSwp(bar) => ThresholdMode::FixedSwp(bar),
            ThresholdModeConfig::FixedVwc(vwc) => ThresholdMode::FixedVwc(vwc),
            ThresholdModeConfig::Residual => ThresholdMode::Residual,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub width: f64,
    pub sand: f64,
    pub clay: f64,
    #[serde(default)]
    pub gravel_vol_fraction: f64,
    pub matric_density: f64,
    #[serde(default)]
    pub impermeability: f64,
    pub initial_soil_temp: f64,
    pub evap_coeff: f64,
    /// In veg order [trees, shrubs, forbs, grasses].
    pub transp_coeff: [f64; N_VEG],
    /// `None` (or `EstimateCosby1984`) means "estimate via Cosby 1984 PTF
    /// from sand/clay"; `EstimateSaxton2006` estimates saturated theta via
    /// the Saxton 2006 regression instead.
    pub swrc: Option<SwrcConfig>,
    #[serde(default = "default_swc_min_mode")]
    pub swc_min_mode: ThresholdModeConfig,
    pub swc_init_mode: ThresholdModeConfig,
    pub swc_wet_mode: ThresholdModeConfig,
}

fn default_swc_min_mode() -> ThresholdModeConfig {
    ThresholdModeConfig::Residual
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CanopyHeightConfig {
    pub constant: Option<f64>,
    pub tangent: Option<TangentCanopyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TangentCanopyConfig {
    pub xinflec: f64,
    pub yinflec: f64,
    pub range: f64,
    pub slope: f64,
}

impl CanopyHeightConfig {
    fn into_canopy_height(self) -> SimResult<CanopyHeight> {
        match (self.constant, self.tangent) {
            (Some(h), None) => Ok(CanopyHeight::Constant(h)),
            (None, Some(t)) => Ok(CanopyHeight::Tangent {
                xinflec: t.xinflec,
                yinflec: t.yinflec,
                range: t.range,
                slope: t.slope,
            }),
            _ => Err(SimError::ConfigError {
                reason: "canopy height config must set exactly one of constant/tangent".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegTypeConfig {
    #[serde(default)]
    pub cover: f64,
    #[serde(default)]
    pub albedo: f64,
    pub litter_monthly: [f64; 12],
    pub biomass_monthly: [f64; 12],
    pub pct_live_monthly: [f64; 12],
    pub lai_conv_monthly: [f64; 12],
    pub canopy_height: CanopyHeightConfig,
    pub canopy_k_smax: f64,
    #[serde(default)]
    pub canopy_k_dead: f64,
    pub litter_k_smax: f64,
    pub est_lai_param: f64,
    pub bare_soil_evap_cutoff: f64,
    #[serde(default = "default_shade_scale")]
    pub shade_scale: f64,
    #[serde(default)]
    pub shade_deadmax: f64,
    #[serde(default)]
    pub shade_xinflex: f64,
    #[serde(default)]
    pub shade_slope: f64,
    #[serde(default)]
    pub shade_yinflex: f64,
    #[serde(default)]
    pub shade_range: f64,
    pub es_param_limit: f64,
    pub watrate_bs_shift: f64,
    pub watrate_bs_shape: f64,
    pub watrate_bs_inflec: f64,
    pub watrate_bs_range: f64,
    pub watrate_t_shift: f64,
    pub watrate_t_shape: f64,
    pub watrate_t_inflec: f64,
    pub watrate_t_range: f64,
    #[serde(default)]
    pub hydred_enabled: bool,
    #[serde(default)]
    pub hydred_max_cond_root: f64,
    #[serde(default)]
    pub hydred_swp50: f64,
    #[serde(default)]
    pub hydred_shape_cond: f64,
    pub crit_swp_bar: f64,
    #[serde(default = "default_co2_one")]
    pub co2_bio_c1: f64,
    #[serde(default)]
    pub co2_bio_c2: f64,
    #[serde(default = "default_co2_one")]
    pub co2_wue_c1: f64,
    #[serde(default)]
    pub co2_wue_c2: f64,
}

fn default_shade_scale() -> f64 {
    1.0
}

fn default_co2_one() -> f64 {
    1.0
}

impl VegTypeConfig {
    fn into_veg_type(self, kind: VegKind) -> SimResult<VegType> {
        Ok(VegType {
            kind,
            cover: self.cover,
            albedo: self.albedo,
            monthly: crate::engine::site::vegetation::MonthlyVegInputs {
                litter: self.litter_monthly,
                biomass: self.biomass_monthly,
                pct_live: self.pct_live_monthly,
                lai_conv: self.lai_conv_monthly,
            },
            canopy_height: self.canopy_height.into_canopy_height()?,
            canopy_intercept: InterceptionParams {
                k_smax: self.canopy_k_smax,
                k_dead: self.canopy_k_dead,
            },
            litter_intercept_k_smax: self.litter_k_smax,
            est_lai_param: self.est_lai_param,
            bare_soil_evap_cutoff: self.bare_soil_evap_cutoff,
            shade_scale: self.shade_scale,
            shade_deadmax: self.shade_deadmax,
            shade_xinflex: self.shade_xinflex,
            shade_slope: self.shade_slope,
            shade_yinflex: self.shade_yinflex,
            shade_range: self.shade_range,
            es_param_limit: self.es_param_limit,
            watrate_bs: CurveParams {
                shift: self.watrate_bs_shift,
                shape: self.watrate_bs_shape,
                inflec: self.watrate_bs_inflec,
                range: self.watrate_bs_range,
            },
            watrate_t: CurveParams {
                shift: self.watrate_t_shift,
                shape: self.watrate_t_shape,
                inflec: self.watrate_t_inflec,
                range: self.watrate_t_range,
            },
            hydred: HydRedParams {
                enabled: self.hydred_enabled,
                max_cond_root: self.hydred_max_cond_root,
                swp50: self.hydred_swp50,
                shape_cond: self.hydred_shape_cond,
            },
            crit_swp_bar: self.crit_swp_bar,
            co2: Co2Coeffs {
                bio_c1: self.co2_bio_c1,
                bio_c2: self.co2_bio_c2,
                wue_c1: self.co2_wue_c1,
                wue_c2: self.co2_wue_c2,
            },
            daily_litter: Vec::new(),
            daily_biomass: Vec::new(),
            daily_pct_live: Vec::new(),
            daily_lai_conv: Vec::new(),
            s_veg: 0.0,
            s_lit: 0.0,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegetationConfig {
    pub trees: VegTypeConfig,
    pub shrubs: VegTypeConfig,
    pub forbs: VegTypeConfig,
    pub grasses: VegTypeConfig,
}

/// Full on-disk site configuration: everything 6 ("Input to site loader")
/// requires, plus metadata. Loads/saves as YAML, same contract as the
/// teacher's `WorkspaceConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub metadata: SiteMetadata,
    pub layers: Vec<LayerConfig>,
    /// Transpiration region lower-bound layer indices (0-based, inclusive),
    /// strictly increasing, at most 4.
    #[serde(default)]
    pub region_bounds: Vec<usize>,
    pub vegetation: VegetationConfig,
    #[serde(default)]
    pub bare_ground_cover: f64,
    #[serde(default)]
    pub global: GlobalParams,
}

impl SiteConfig {
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Build the fully validated, run-fixed `SiteDefinition` this config
    /// describes, per 4.2 steps 1-10.
    pub fn build(
        self,
    ) -> SimResult<(SiteDefinition, Vec<crate::engine::diagnostics::WarningEvent>)> {
        let mut layers: Vec<Layer> = Vec::with_capacity(self.layers.len());
        for (id, layer_cfg) in self.layers.into_iter().enumerate() {
            let spec = LayerSpec {
                id,
                width: layer_cfg.width,
                sand: layer_cfg.sand,
                clay: layer_cfg.clay,
                gravel_vol_fraction: layer_cfg.gravel_vol_fraction,
                matric_density: layer_cfg.matric_density,
                impermeability: layer_cfg.impermeability,
                initial_soil_temp: layer_cfg.initial_soil_temp,
                evap_coeff: layer_cfg.evap_coeff,
                transp_coeff: layer_cfg.transp_coeff,
                swrc: layer_cfg
                    .swrc
                    .map(|c| c.resolve(layer_cfg.sand, layer_cfg.clay)),
                swc_min_mode: layer_cfg.swc_min_mode.into(),
                swc_init_mode: layer_cfg.swc_init_mode.into(),
                swc_wet_mode: layer_cfg.swc_wet_mode.into(),
            };
            layers.push(derive_layer(spec)?);
        }

        let regions = TranspirationRegions::new(self.region_bounds)?;

        let veg = [
            self.vegetation.trees.into_veg_type(VegKind::Trees)?,
            self.vegetation.shrubs.into_veg_type(VegKind::Shrubs)?,
            self.vegetation.forbs.into_veg_type(VegKind::Forbs)?,
            self.vegetation.grasses.into_veg_type(VegKind::Grasses)?,
        ];

        SiteDefinition::validate_and_derive(
            layers,
            regions,
            veg,
            self.bare_ground_cover,
            self.global,
        )
    }
}
