use std::fmt::Write;

use crate::controls::MIN_ZOOM;
use crate::look::LookControls;
use crate::physics;
use crate::quality::QualitySettings;
use crate::volume::HOVER_COS_SHIFT;

pub const ATTR_POSITION: &str = "a_position";
pub const UNIFORM_TIME: &str = "u_time";
pub const UNIFORM_RESOLUTION: &str = "u_resolution";
pub const UNIFORM_ZOOM: &str = "u_cameraZoom";
pub const UNIFORM_YAW: &str = "u_viewYaw";
pub const UNIFORM_PITCH: &str = "u_viewPitch";
pub const UNIFORM_HOVER: &str = "u_hover";

pub const UNIFORM_NAMES: [&str; 6] = [
    UNIFORM_TIME,
    UNIFORM_RESOLUTION,
    UNIFORM_ZOOM,
    UNIFORM_YAW,
    UNIFORM_PITCH,
    UNIFORM_HOVER,
];

/// Shading-language capability level of the acquired context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderMode {
    /// GLSL ES 1.00 (WebGL1).
    Legacy,
    /// GLSL ES 3.00 (WebGL2).
    Modern,
}

struct Syntax {
    version: &'static str,
    vertex_in: &'static str,
    vertex_out: &'static str,
    fragment_in: &'static str,
    fragment_out: &'static str,
    frag_color: &'static str,
}

impl ShaderMode {
    /// Probe order: the higher capability first.
    pub const PREFERENCE: [ShaderMode; 2] = [ShaderMode::Modern, ShaderMode::Legacy];

    pub fn name(&self) -> &'static str {
        match self {
            ShaderMode::Legacy => "WebGL1",
            ShaderMode::Modern => "WebGL2",
        }
    }

    fn syntax(&self) -> Syntax {
        match self {
            ShaderMode::Modern => Syntax {
                version: "#version 300 es",
                vertex_in: "in",
                vertex_out: "out",
                fragment_in: "in",
                fragment_out: "out vec4 fragColor;",
                frag_color: "fragColor",
            },
            ShaderMode::Legacy => Syntax {
                version: "#version 100",
                vertex_in: "attribute",
                vertex_out: "varying",
                fragment_in: "varying",
                fragment_out: "",
                frag_color: "gl_FragColor",
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderSources {
    pub mode: ShaderMode,
    pub vertex: String,
    pub fragment: String,
}

/// Builds both stages for `mode`. The fragment body is shared; only the
/// header (syntax keywords and baked constants) differs between modes.
pub fn assemble(mode: ShaderMode, settings: &QualitySettings, look: &LookControls) -> ShaderSources {
    let syntax = mode.syntax();

    let vertex = format!(
        "{version}\n\
         {input} vec2 {attr};\n\
         {output} vec2 v_uv;\n\
         void main() {{\n\
         \x20 v_uv = {attr} * 0.5 + 0.5;\n\
         \x20 gl_Position = vec4({attr}, 0.0, 1.0);\n\
         }}\n",
        version = syntax.version,
        input = syntax.vertex_in,
        output = syntax.vertex_out,
        attr = ATTR_POSITION,
    );

    let mut fragment = String::with_capacity(FRAGMENT_BODY.len() + 2048);
    fragment.push_str(syntax.version);
    fragment.push_str("\nprecision highp float;\nprecision highp int;\n");
    let _ = writeln!(fragment, "#define FRAG_COLOR {}", syntax.frag_color);
    if settings.jet_enabled {
        fragment.push_str("#define JET_ENABLED 1\n");
    }
    if settings.bloom_enabled {
        fragment.push_str("#define BLOOM_ENABLED 1\n");
    }
    let _ = writeln!(fragment, "{} vec2 v_uv;", syntax.fragment_in);
    if !syntax.fragment_out.is_empty() {
        let _ = writeln!(fragment, "{}", syntax.fragment_out);
    }
    for name in UNIFORM_NAMES {
        let ty = if name == UNIFORM_RESOLUTION { "vec2" } else { "float" };
        let _ = writeln!(fragment, "uniform {} {};", ty, name);
    }

    let constants: [(&str, f32); 20] = [
        ("RS", physics::RS),
        ("M", physics::M),
        ("CRITICAL_B", physics::CRITICAL_B),
        ("ISCO", physics::ISCO),
        ("DISK_INNER", physics::DISK_INNER),
        ("DISK_OUTER", physics::DISK_OUTER),
        ("INCLINATION", physics::INCLINATION),
        ("ESCAPE_RADIUS", physics::ESCAPE_RADIUS),
        ("CAMERA_DISTANCE", physics::CAMERA_DISTANCE),
        ("ORBIT_RATE", physics::ORBIT_RATE),
        ("MIN_DENOM", physics::MIN_DENOM),
        ("MIN_ZOOM", MIN_ZOOM),
        ("HOVER_COS_SHIFT", HOVER_COS_SHIFT),
        ("ADAPTIVE_STEP", settings.adaptive_step),
        ("EXPOSURE", look.exposure),
        ("HIGHLIGHT_KNEE", look.highlight_knee),
        ("INV_GAMMA", look.inverse_gamma()),
        ("RING_GAIN", look.ring_gain()),
        ("RING_SPREAD", look.ring_spread()),
        ("PI", std::f32::consts::PI),
    ];
    let _ = writeln!(fragment, "const int MAX_STEPS = {};", settings.max_steps.max(1));
    for (name, value) in constants {
        let _ = writeln!(fragment, "const float {} = {};", name, glsl_float(value));
    }
    fragment.push_str(FRAGMENT_BODY);

    ShaderSources { mode, vertex, fragment }
}

/// Float literal GLSL accepts in both modes (always carries a decimal point).
pub fn glsl_float(value: f32) -> String {
    if value.abs() >= 0.01 || value == 0.0 {
        format!("{:.4}", value)
    } else {
        format!("{:.8}", value)
    }
}

const FRAGMENT_BODY: &str = r#"
float hash(vec2 p) {
  vec3 p3 = fract(vec3(p.xyx) * 0.1031);
  p3 = p3 + dot(p3, p3.yzx + 33.33);
  return fract((p3.x + p3.y) * p3.z);
}

// sine-only turbulence, no lattice artifacts
float smoothTurb(vec2 p, float t) {
  float v = 0.0;
  v += sin(p.x * 1.2 + t * 0.7) * cos(p.y * 0.9 - t * 0.5) * 0.5;
  v += sin(p.x * 2.3 - t * 1.1 + p.y * 1.8) * 0.3;
  v += cos(p.y * 2.7 + t * 0.9 - p.x * 0.6) * 0.25;
  v += sin(p.x * 4.1 + p.y * 3.2 + t * 1.5) * 0.15;
  v += cos(p.x * 3.5 - p.y * 4.0 - t * 1.3) * 0.12;
  v += sin(p.x * 6.0 + t * 2.0) * cos(p.y * 5.5 - t * 1.8) * 0.08;
  return v * 0.5 + 0.5;
}

vec3 diskColor(float r, float temp) {
  float t = clamp(1.0 - pow(DISK_INNER / max(r, DISK_INNER), 0.75), 0.0, 1.0);
  vec3 white = vec3(1.5, 1.5, 1.45);
  vec3 paleYellow = vec3(1.4, 1.35, 1.0);
  vec3 gold = vec3(1.3, 1.0, 0.5);
  vec3 orange = vec3(1.2, 0.65, 0.2);
  vec3 amber = vec3(1.0, 0.45, 0.12);
  vec3 redBrown = vec3(0.7, 0.25, 0.08);
  vec3 c;
  if (t < 0.2) {
    c = mix(white, paleYellow, t * 5.0);
  } else if (t < 0.4) {
    c = mix(paleYellow, gold, (t - 0.2) * 5.0);
  } else if (t < 0.6) {
    c = mix(gold, orange, (t - 0.4) * 5.0);
  } else if (t < 0.8) {
    c = mix(orange, amber, (t - 0.6) * 5.0);
  } else {
    c = mix(amber, redBrown, (t - 0.8) * 5.0);
  }
  return c + vec3(0.25, 0.15, 0.05) * temp;
}

vec4 sampleDiskVolume(vec3 pos, vec3 vel, float hover) {
  float r = sqrt(pos.x * pos.x + pos.z * pos.z);
  float absY = abs(pos.y);
  float thickness = 0.08 + 0.12 * smoothstep(DISK_INNER, DISK_OUTER, r);
  float verticalDensity = exp(-absY * absY / (thickness * thickness * 2.0));
  if (r < DISK_INNER * 0.9 || r > DISK_OUTER * 1.1 || verticalDensity < 0.01) {
    return vec4(0.0);
  }
  float radialDensity = smoothstep(DISK_INNER * 0.9, DISK_INNER * 1.3, r)
                      * (1.0 - smoothstep(DISK_OUTER * 0.6, DISK_OUTER * 1.1, r));

  float t = u_time;
  float orbitalPhase = t * 8.0 / (r * sqrt(r));
  float flowX = pos.x * cos(orbitalPhase) - pos.z * sin(orbitalPhase);
  float flowZ = pos.x * sin(orbitalPhase) + pos.z * cos(orbitalPhase);

  float turb1 = smoothTurb(vec2(flowX * 0.8, flowZ * 0.8), t * 1.5);
  float turb2 = smoothTurb(vec2(flowX * 1.5 + 5.0, flowZ * 1.2 + 3.0), t * 2.0);
  float turb3 = smoothTurb(vec2(flowX * 0.4, flowZ * 0.5), t * 0.8);
  float turbulence = turb1 * 0.5 + turb2 * 0.3 + turb3 * 0.2;

  float flow1 = sin(flowX * 1.5 + flowZ * 0.8 + t * 2.0) * 0.5 + 0.5;
  float flow2 = cos(flowX * 0.9 - flowZ * 1.2 - t * 1.5) * 0.5 + 0.5;
  float flowBright = flow1 * 0.4 + flow2 * 0.3 + 0.3;

  // m=2 logarithmic spiral density wave
  float angle = atan(pos.z, pos.x);
  float spiralPhase = 2.0 * angle - t * 0.8 + 2.5 * log(max(r, 0.1));
  flowBright *= 1.0 + 0.06 * cos(spiralPhase);

  float radialBright = pow(DISK_INNER / max(r, DISK_INNER), 1.5);

  float vOrb = min(sqrt(M / max(r, DISK_INNER)), 0.7);
  vec2 orbitDir = vec2(-pos.z, pos.x) / max(r, MIN_DENOM);
  float velLen = max(length(vel), MIN_DENOM);
  vec2 los = -vel.xz / velLen;
  float cosTheta = dot(orbitDir, los) + hover * HOVER_COS_SHIFT;

  float gamma = 1.0 / sqrt(max(1.0 - vOrb * vOrb, 0.01));
  float delta = 1.0 / max(gamma * (1.0 - vOrb * cosTheta), 0.1);
  float dopplerBright = clamp(delta * delta * delta, 0.15, 6.0);

  float density = verticalDensity * radialDensity;
  float brightness = radialBright * dopplerBright * (0.4 + turbulence * 0.4 + flowBright * 0.5);
  vec3 col = diskColor(r, turbulence * 0.5) * brightness * 3.5;

  float colorShift = clamp((delta - 1.0) * 1.5, -1.0, 1.0);
  if (colorShift > 0.0) {
    col.b = col.b * (1.0 + colorShift * colorShift * 3.0) + colorShift * 0.5;
    col.g = col.g * (1.0 + colorShift * 1.5);
    col.r = col.r * (1.0 - colorShift * 0.2);
  } else {
    float redShift = -colorShift;
    col.r = col.r * (1.0 + redShift * 0.8);
    col.g = col.g * (1.0 - redShift * 0.4);
    col.b = col.b * (1.0 - redShift * 0.8);
  }

  float gravRedshift = sqrt(max(1.0 - RS / max(r, RS * 1.01), 0.01));
  col *= gravRedshift;
  float gravColorShift = (1.0 - gravRedshift) * 3.0;
  col.b = col.b * (1.0 - gravColorShift * 0.5);
  col.g = col.g * (1.0 - gravColorShift * 0.2);

  return vec4(col, density);
}

#ifdef JET_ENABLED
vec4 sampleJet(vec3 pos) {
  float absY = abs(pos.y);
  if (absY < 0.6 || absY > 12.0) return vec4(0.0);
  float r = sqrt(pos.x * pos.x + pos.z * pos.z);
  float jetRadius = 0.15 + 0.08 * sqrt(absY);
  float radialFall = exp(-r * r / (jetRadius * jetRadius * 3.0));
  if (radialFall < 0.02) return vec4(0.0);
  float core = exp(-r * r / (jetRadius * jetRadius * 0.3));
  float baseFade = smoothstep(0.6, 2.5, absY);
  float tipFade = 1.0 - smoothstep(6.0, 12.0, absY);
  float wave1 = sin(absY * 0.8 - u_time * 4.0) * 0.5 + 0.5;
  float wave2 = sin(absY * 0.4 - u_time * 2.8) * 0.5 + 0.5;
  float smoothWave = wave1 * 0.7 + wave2 * 0.3;
  float density = radialFall * baseFade * tipFade * (0.5 + 0.4 * smoothWave);
  vec3 color = mix(vec3(0.35, 0.25, 0.6), vec3(0.7, 0.85, 1.0), core * core + smoothWave * 0.2);
  return vec4(color, density * 0.6);
}
#endif

void main() {
  vec2 uv = (gl_FragCoord.xy - 0.5 * u_resolution) / max(min(u_resolution.x, u_resolution.y), 1.0);
  float hover = clamp(u_hover, 0.0, 1.0);

  float camDist = CAMERA_DISTANCE / max(u_cameraZoom, MIN_ZOOM);
  float orbitAngle = u_time * ORBIT_RATE + u_viewYaw;
  float cI = cos(INCLINATION);
  float sI = sin(INCLINATION);
  float cO = cos(orbitAngle);
  float sO = sin(orbitAngle);
  vec3 camPos = vec3(sO * cI * camDist, sI * camDist + u_viewPitch * camDist * 0.5, cO * cI * camDist);

  vec3 fwd = -camPos / camDist;
  vec3 right = vec3(cO, 0.0, -sO);
  vec3 up = cross(right, fwd);
  up = up / max(length(up), MIN_DENOM);
  vec3 rd = fwd + uv.x * right + uv.y * up;
  rd = rd / max(length(rd), MIN_DENOM);

  vec3 pos = camPos;
  vec3 vel = rd;
  vec3 color = vec3(0.0);
  float alpha = 0.0;
  float stepSize = ADAPTIVE_STEP;

  float portalCycle = sin(u_time * 0.4) * 0.5 + 0.5;
  float portalIntensity = 0.85 + 0.25 * portalCycle;
  vec3 ringColor = mix(vec3(1.15, 1.05, 0.95), vec3(1.1, 1.15, 1.25), portalCycle * 0.3);

  for (int i = 0; i < MAX_STEPS; i++) {
    float r = length(pos);
    if (r < RS) {
      color = mix(color, vec3(0.0), 1.0 - alpha);
      alpha = 1.0;
      break;
    }
    if (r >= ESCAPE_RADIUS) {
      float starVal = pow(hash(vec2(rd.x * 400.0 + rd.y * 200.0, rd.z * 300.0)), 35.0) * 0.3;
      color += vec3(starVal) * (1.0 - alpha);
      break;
    }

    // bend toward the mass: 1.5 RS h^2 / r^4
    vec3 h = cross(pos, vel);
    float h2 = dot(h, h);
    float rInv = 1.0 / max(r, MIN_DENOM);
    float accel = 1.5 * RS * h2 * rInv * rInv * rInv * rInv;
    vel -= pos * rInv * accel * stepSize;
    vel = vel / max(length(vel), MIN_DENOM);

    stepSize = ADAPTIVE_STEP + 0.06 * smoothstep(RS * 2.0, RS * 8.0, r);

    vec4 disk = sampleDiskVolume(pos, vel, hover);
    if (disk.a > 0.01) {
      float contribution = disk.a * stepSize * 8.0 * (1.0 - alpha);
      color += disk.rgb * contribution;
      alpha += contribution * 0.5;
    }

#ifdef JET_ENABLED
    vec4 jet = sampleJet(pos);
    if (jet.a > 0.01) {
      float a = jet.a * 0.008 * (1.0 - alpha);
      color += jet.rgb * a;
      alpha += a * 0.2;
    }
#endif

    float prDist = abs(r - CRITICAL_B);
    float primaryRing = exp(-prDist * prDist * 200.0 / RING_SPREAD);
    float pr2Dist = abs(r - CRITICAL_B * 0.95);
    float secondaryRing = exp(-pr2Dist * pr2Dist * 400.0 / RING_SPREAD) * 0.4;
    float shimmer = 1.0 + 0.025 * sin(u_time * 2.5 + r * 6.0);
    float prPulse = 0.7 + 0.3 * sin(u_time * 3.0 + atan(pos.z, pos.x) * 3.0);
    float hoverBoost = 1.0 + hover * 0.3;
    float prGlow = (primaryRing + secondaryRing) * 0.4 * prPulse * shimmer * portalIntensity
                 * hoverBoost * RING_GAIN * (1.0 - alpha);
    float chromatic = primaryRing * 0.02;
    vec3 ring = ringColor * prGlow;
    ring.r *= 1.0 + chromatic;
    ring.b *= 1.0 - chromatic;
    color += ring;

    pos += vel * stepSize;
    alpha = min(alpha, 1.0);
    if (alpha > 0.95) break;
  }

  // Einstein ring and mirrored secondary arc around the closest approach
  float rayClosest = -dot(camPos, rd);
  if (rayClosest > 0.0) {
    vec3 cp = camPos + rd * rayClosest;
    float closestR = length(cp);
    float arcIntensity = 0.8 + 0.3 * portalCycle;

    float erDist = closestR - RS * 2.6;
    float einsteinRing = exp(-erDist * erDist * 80.0);
    color += vec3(1.0, 0.88, 0.65) * einsteinRing * 0.35 * arcIntensity * (1.0 - alpha * 0.7);

    float arcDist = abs(closestR - RS * 3.5);
    float secondaryArc = exp(-arcDist * arcDist * 45.0) * 0.25 * arcIntensity * (1.0 + hover * 0.2);
    float upperWeight = smoothstep(-0.5, 0.5, cp.y) * 0.6;
    float lowerWeight = (1.0 - smoothstep(-0.5, 0.5, cp.y)) * 0.6;
    color += vec3(1.05, 0.72, 0.38) * secondaryArc * (upperWeight + lowerWeight) * (1.0 - alpha * 0.8);
  }

  float gapDist = abs(length(uv) - 0.08);
  color *= 1.0 - exp(-gapDist * gapDist * 800.0) * 0.15;

#ifdef BLOOM_ENABLED
  float bloomLum = dot(color, vec3(0.299, 0.587, 0.114));
  color += color * smoothstep(0.6, 2.0, bloomLum) * 0.2;
#endif

  color *= EXPOSURE;
  float lum = dot(color, vec3(0.299, 0.587, 0.114));
  if (lum > HIGHLIGHT_KNEE) {
    float over = lum - HIGHLIGHT_KNEE;
    color *= (HIGHLIGHT_KNEE + over / (1.0 + over)) / lum;
  }

  color = (color * (2.51 * color + 0.03)) / (color * (2.43 * color + 0.59) + 0.14);
  color = pow(clamp(color, 0.0, 1.0), vec3(INV_GAMMA));
  color *= 0.92 + 0.08 * (1.0 - smoothstep(0.5, 1.4, length(uv)));

  FRAG_COLOR = vec4(color, 1.0);
}
"#;
